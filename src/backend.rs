use anyhow::Result;

/// What the run needs to know about a device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub global_mem_size: u64,
    pub max_work_group_size: usize,
    pub supports_fp64: bool,
}

/// Host access pattern of a device buffer, from the kernel's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferAccess {
    ReadOnly,
    WriteOnly,
}

/// Global and local work sizes of a one-dimensional dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkSize {
    pub global: usize,
    pub local: usize,
}

/// Outcome of compiling a program: the kernel, or the compiler's log.
#[derive(Debug)]
pub enum BuildOutcome<K> {
    Built(K),
    Failed { log: String },
}

/// Platform/device discovery shared by the real OpenCL runtime and test doubles.
pub trait ComputeBackend {
    type Session: ComputeSession;

    /// Names of the available platforms, in enumeration order.
    fn platforms(&self) -> Result<Vec<String>>;
    fn devices(&self, platform: usize) -> Result<Vec<DeviceInfo>>;
    /// Creates a context and command queue bound to a single device.
    fn open_session(&self, platform: usize, device: usize) -> Result<Self::Session>;
}

/// A context plus command queue on one device. Every call blocks until the
/// device has finished the corresponding work.
pub trait ComputeSession {
    type Kernel;
    type Buffer;

    fn device(&self) -> &DeviceInfo;
    /// Compiles `source` and looks up `entry_point` in the resulting program.
    /// A compiler rejection is reported as [`BuildOutcome::Failed`]; API
    /// failures are errors.
    fn build_kernel(&self, source: &str, entry_point: &str) -> Result<BuildOutcome<Self::Kernel>>;
    /// Largest work-group the compiled kernel can be launched with on this device.
    fn kernel_work_group_size(&self, kernel: &Self::Kernel) -> usize;
    fn create_buffer(&self, access: BufferAccess, len: usize) -> Result<Self::Buffer>;
    fn write_buffer(&self, buffer: &mut Self::Buffer, src: &[f64]) -> Result<()>;
    /// Runs `kernel(a, b, out)` and waits for completion.
    fn dispatch(
        &self,
        kernel: &Self::Kernel,
        a: &Self::Buffer,
        b: &Self::Buffer,
        out: &mut Self::Buffer,
        work: WorkSize,
    ) -> Result<()>;
    fn read_buffer(&self, buffer: &Self::Buffer, dst: &mut [f64]) -> Result<()>;
}
