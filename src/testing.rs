//! In-memory compute backend for exercising the run without an OpenCL runtime.

use crate::backend::{
    BufferAccess, BuildOutcome, ComputeBackend, ComputeSession, DeviceInfo, WorkSize,
};

use anyhow::{Result, anyhow, bail, ensure};
use std::cell::RefCell;
use std::rc::Rc;

/// Backend operations, in the order they reached the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Platforms,
    Devices(usize),
    OpenSession(usize, usize),
    BuildKernel(String),
    CreateBuffer(BufferAccess, usize),
    WriteBuffer(Vec<f64>),
    Dispatch { work: WorkSize, output: Vec<f64> },
    ReadBuffer,
}

type CallLog = Rc<RefCell<Vec<Call>>>;

impl DeviceInfo {
    pub fn mock(name: &str) -> Self {
        DeviceInfo {
            name: name.to_string(),
            vendor: "Mock Vendor".to_string(),
            global_mem_size: 1024 * 1024 * 1024,
            max_work_group_size: 256,
            supports_fp64: true,
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    platforms: Vec<(String, Vec<DeviceInfo>)>,
    /// When set, every build fails with this log.
    pub build_log: Option<String>,
    /// Overwrites one output element after the kernel ran.
    pub fault: Option<(usize, f64)>,
    /// Per-kernel work-group limit; defaults to the device maximum.
    pub kernel_work_group_size: Option<usize>,
    /// Platform whose device query fails.
    pub failing_devices: Option<usize>,
    calls: CallLog,
}

impl MockBackend {
    pub fn with_platforms(platforms: Vec<(&str, Vec<DeviceInfo>)>) -> Self {
        MockBackend {
            platforms: platforms
                .into_iter()
                .map(|(name, devices)| (name.to_string(), devices))
                .collect(),
            ..MockBackend::default()
        }
    }

    pub fn single(platform: &str, device: &str) -> Self {
        Self::with_platforms(vec![(platform, vec![DeviceInfo::mock(device)])])
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn platform_devices(&self, platform: usize) -> Result<&Vec<DeviceInfo>> {
        self.platforms
            .get(platform)
            .map(|(_, devices)| devices)
            .ok_or_else(|| anyhow!("mock platform {} does not exist", platform))
    }
}

impl ComputeBackend for MockBackend {
    type Session = MockSession;

    fn platforms(&self) -> Result<Vec<String>> {
        self.record(Call::Platforms);
        Ok(self.platforms.iter().map(|(name, _)| name.clone()).collect())
    }

    fn devices(&self, platform: usize) -> Result<Vec<DeviceInfo>> {
        self.record(Call::Devices(platform));
        if self.failing_devices == Some(platform) {
            bail!("CL_DEVICE_NOT_FOUND on mock platform {}", platform);
        }
        Ok(self.platform_devices(platform)?.clone())
    }

    fn open_session(&self, platform: usize, device: usize) -> Result<MockSession> {
        self.record(Call::OpenSession(platform, device));
        let info = self
            .platform_devices(platform)?
            .get(device)
            .cloned()
            .ok_or_else(|| anyhow!("mock device {} does not exist", device))?;
        Ok(MockSession {
            info,
            build_log: self.build_log.clone(),
            fault: self.fault,
            kernel_work_group_size: self.kernel_work_group_size,
            calls: Rc::clone(&self.calls),
        })
    }
}

pub struct MockSession {
    info: DeviceInfo,
    build_log: Option<String>,
    fault: Option<(usize, f64)>,
    kernel_work_group_size: Option<usize>,
    calls: CallLog,
}

pub struct MockBuffer {
    access: BufferAccess,
    data: Vec<f64>,
}

impl MockSession {
    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl ComputeSession for MockSession {
    type Kernel = String;
    type Buffer = MockBuffer;

    fn device(&self) -> &DeviceInfo {
        &self.info
    }

    fn build_kernel(&self, _source: &str, entry_point: &str) -> Result<BuildOutcome<String>> {
        self.record(Call::BuildKernel(entry_point.to_string()));
        Ok(match &self.build_log {
            Some(log) => BuildOutcome::Failed { log: log.clone() },
            None => BuildOutcome::Built(entry_point.to_string()),
        })
    }

    fn kernel_work_group_size(&self, _kernel: &String) -> usize {
        self.kernel_work_group_size
            .unwrap_or(self.info.max_work_group_size)
    }

    fn create_buffer(&self, access: BufferAccess, len: usize) -> Result<MockBuffer> {
        self.record(Call::CreateBuffer(access, len));
        Ok(MockBuffer {
            access,
            data: vec![0.0; len],
        })
    }

    fn write_buffer(&self, buffer: &mut MockBuffer, src: &[f64]) -> Result<()> {
        self.record(Call::WriteBuffer(src.to_vec()));
        ensure!(src.len() <= buffer.data.len(), "write past end of mock buffer");
        buffer.data[..src.len()].copy_from_slice(src);
        Ok(())
    }

    fn dispatch(
        &self,
        kernel: &String,
        a: &MockBuffer,
        b: &MockBuffer,
        out: &mut MockBuffer,
        work: WorkSize,
    ) -> Result<()> {
        ensure!(kernel == "sumBuffers", "unknown kernel {}", kernel);
        ensure!(
            a.access == BufferAccess::ReadOnly
                && b.access == BufferAccess::ReadOnly
                && out.access == BufferAccess::WriteOnly,
            "kernel arguments bound with the wrong access flags"
        );
        ensure!(
            work.local != 0 && work.global % work.local == 0,
            "local size {} does not divide global size {}",
            work.local,
            work.global
        );
        ensure!(work.global <= out.data.len(), "global size exceeds buffer length");

        for i in 0..work.global {
            out.data[i] = a.data[i] + b.data[i];
        }
        if let Some((index, value)) = self.fault {
            out.data[index] = value;
        }
        self.record(Call::Dispatch {
            work,
            output: out.data.clone(),
        });
        Ok(())
    }

    fn read_buffer(&self, buffer: &MockBuffer, dst: &mut [f64]) -> Result<()> {
        self.record(Call::ReadBuffer);
        ensure!(dst.len() <= buffer.data.len(), "read past end of mock buffer");
        dst.copy_from_slice(&buffer.data[..dst.len()]);
        Ok(())
    }
}
