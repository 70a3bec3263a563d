//! Context, queue, program and buffer handling on top of `opencl3`.

use crate::backend::{
    BufferAccess, BuildOutcome, ComputeBackend, ComputeSession, DeviceInfo, WorkSize,
};

use anyhow::{Context as _, Result, anyhow};
use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    device::{CL_DEVICE_TYPE_ALL, Device, get_device_ids},
    error_codes::ClError,
    kernel::{ExecuteKernel, Kernel},
    memory::{Buffer, CL_MEM_ALLOC_HOST_PTR, CL_MEM_READ_ONLY, CL_MEM_WRITE_ONLY},
    platform::{Platform, get_platforms},
    program::Program,
    types::{CL_BLOCKING, cl_device_id, cl_double, cl_int},
};
use std::ptr;

/// Returned by the ICD loader when no vendor implementation is installed.
const CL_PLATFORM_NOT_FOUND_KHR: cl_int = -1001;

/// Platforms are enumerated once, when the backend is created.
pub struct OpenClBackend {
    platforms: Vec<Platform>,
}

impl OpenClBackend {
    pub fn new() -> Result<Self> {
        let platforms = match get_platforms() {
            Ok(platforms) => platforms,
            Err(ClError(CL_PLATFORM_NOT_FOUND_KHR)) => Vec::new(),
            Err(e) => return Err(e).context("Failed to get OpenCL platforms"),
        };
        log::debug!("ICD loader reported {} platform(s)", platforms.len());
        Ok(Self { platforms })
    }

    fn platform(&self, index: usize) -> Result<&Platform> {
        self.platforms
            .get(index)
            .ok_or_else(|| anyhow!("OpenCL platform index {} out of range", index))
    }

    fn device_ids(&self, platform: usize) -> Result<Vec<cl_device_id>> {
        let platform = self.platform(platform)?;
        get_device_ids(platform.id(), CL_DEVICE_TYPE_ALL)
            .map_err(ClError)
            .with_context(|| {
                format!(
                    "Failed to get devices for platform {}",
                    platform_name(platform)
                )
            })
    }
}

fn platform_name(platform: &Platform) -> String {
    platform
        .name()
        .unwrap_or_else(|_| "Unknown Platform".to_string())
}

fn describe(device: &Device) -> DeviceInfo {
    let extensions = device.extensions().unwrap_or_default();
    DeviceInfo {
        name: device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string()),
        vendor: device
            .vendor()
            .unwrap_or_else(|_| "Unknown Vendor".to_string()),
        global_mem_size: device.global_mem_size().unwrap_or(0),
        max_work_group_size: device.max_work_group_size().unwrap_or(1),
        supports_fp64: extensions.split_whitespace().any(|ext| ext == "cl_khr_fp64"),
    }
}

impl ComputeBackend for OpenClBackend {
    type Session = OpenClSession;

    fn platforms(&self) -> Result<Vec<String>> {
        Ok(self.platforms.iter().map(platform_name).collect())
    }

    fn devices(&self, platform: usize) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .device_ids(platform)?
            .into_iter()
            .map(|id| describe(&Device::new(id)))
            .collect())
    }

    fn open_session(&self, platform: usize, device: usize) -> Result<OpenClSession> {
        let ids = self.device_ids(platform)?;
        let id = *ids
            .get(device)
            .ok_or_else(|| anyhow!("OpenCL device index {} out of range", device))?;
        let device = Device::new(id);
        let info = describe(&device);

        let context = Context::from_device(&device)
            .with_context(|| format!("Failed to create OpenCL context for {}", info.name))?;
        // OpenCL 1.2 entry point; some ICDs still lack the 2.0 queue API.
        #[allow(deprecated)]
        let queue = CommandQueue::create_default(&context, 0)
            .context("Failed to create OpenCL command queue")?;

        log::debug!(
            "Opened {} ({}), {} MB global memory, max work-group size {}",
            info.name,
            info.vendor,
            info.global_mem_size / (1024 * 1024),
            info.max_work_group_size
        );

        Ok(OpenClSession {
            queue,
            context,
            device,
            info,
        })
    }
}

/// A context and in-order command queue on one device.
///
/// Fields drop in declaration order: the queue goes before its context.
pub struct OpenClSession {
    queue: CommandQueue,
    context: Context,
    device: Device,
    info: DeviceInfo,
}

/// A kernel together with the program it was created from.
pub struct OpenClKernel {
    kernel: Kernel,
    _program: Program,
}

impl ComputeSession for OpenClSession {
    type Kernel = OpenClKernel;
    type Buffer = Buffer<cl_double>;

    fn device(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_kernel(&self, source: &str, entry_point: &str) -> Result<BuildOutcome<OpenClKernel>> {
        let mut program = Program::create_from_source(&self.context, source)
            .context("Failed to create OpenCL program from source")?;

        if let Err(e) = program.build(&[self.device.id()], "") {
            let log = program
                .get_build_log(self.device.id())
                .unwrap_or_else(|log_err| format!("{} (build log unavailable: {})", e, log_err));
            log::debug!("clBuildProgram failed: {}", e);
            return Ok(BuildOutcome::Failed { log });
        }

        let kernel = Kernel::create(&program, entry_point)
            .with_context(|| format!("Failed to create kernel '{}'", entry_point))?;
        Ok(BuildOutcome::Built(OpenClKernel {
            kernel,
            _program: program,
        }))
    }

    fn kernel_work_group_size(&self, kernel: &OpenClKernel) -> usize {
        match kernel.kernel.get_work_group_size(self.device.id()) {
            Ok(size) => size,
            Err(e) => {
                log::debug!("CL_KERNEL_WORK_GROUP_SIZE query failed: {}", e);
                self.info.max_work_group_size
            }
        }
    }

    fn create_buffer(&self, access: BufferAccess, len: usize) -> Result<Buffer<cl_double>> {
        let flags = match access {
            BufferAccess::ReadOnly => CL_MEM_READ_ONLY,
            BufferAccess::WriteOnly => CL_MEM_WRITE_ONLY,
        } | CL_MEM_ALLOC_HOST_PTR;

        // SAFETY: no host pointer is handed over, the runtime owns the allocation.
        let buffer =
            unsafe { Buffer::<cl_double>::create(&self.context, flags, len, ptr::null_mut()) };
        buffer.with_context(|| format!("Failed to allocate {} doubles ({:?})", len, access))
    }

    fn write_buffer(&self, buffer: &mut Buffer<cl_double>, src: &[f64]) -> Result<()> {
        // SAFETY: blocking write, `src` outlives the call.
        let event = unsafe {
            self.queue
                .enqueue_write_buffer(buffer, CL_BLOCKING, 0, src, &[])
        }
        .context("Failed to write OpenCL buffer")?;
        event.wait().context("Buffer write did not complete")?;
        Ok(())
    }

    fn dispatch(
        &self,
        kernel: &OpenClKernel,
        a: &Buffer<cl_double>,
        b: &Buffer<cl_double>,
        out: &mut Buffer<cl_double>,
        work: WorkSize,
    ) -> Result<()> {
        // SAFETY: argument order and types match the kernel signature.
        let event = unsafe {
            ExecuteKernel::new(&kernel.kernel)
                .set_arg(a)
                .set_arg(b)
                .set_arg(&*out)
                .set_global_work_size(work.global)
                .set_local_work_size(work.local)
                .enqueue_nd_range(&self.queue)
        }
        .with_context(|| {
            format!(
                "Failed to enqueue kernel (global {}, local {})",
                work.global, work.local
            )
        })?;
        event.wait().context("Kernel execution did not complete")?;
        Ok(())
    }

    fn read_buffer(&self, buffer: &Buffer<cl_double>, dst: &mut [f64]) -> Result<()> {
        // SAFETY: blocking read into a slice that outlives the call.
        let event = unsafe {
            self.queue
                .enqueue_read_buffer(buffer, CL_BLOCKING, 0, dst, &[])
        }
        .context("Failed to read OpenCL buffer")?;
        event.wait().context("Buffer read did not complete")?;
        Ok(())
    }
}
