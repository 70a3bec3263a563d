//! OpenCL backend
//!
//! Discovers platforms and devices through the ICD loader and runs the
//! smoke-test kernel on a single device via `opencl3`.

mod session;

pub use session::OpenClBackend;
