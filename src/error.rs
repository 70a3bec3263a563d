//! Terminal conditions of a smoke-test run and the exit status each maps to.

use std::process::ExitCode;

/// Classified failure of a run.
///
/// Everything else that can go wrong (OpenCL API errors, stdin I/O) travels
/// as a plain `anyhow::Error` and exits with status 1.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SmokeError {
    /// The ICD loader reported zero platforms.
    #[error("no OpenCL platforms found")]
    NoPlatforms,
    /// The selected platform exposes zero devices.
    #[error("no OpenCL devices found on platform '{platform}'")]
    NoDevices { platform: String },
    /// The kernel failed to compile for the selected device.
    #[error("kernel build failed: {}", .log.trim())]
    Build { log: String },
    /// A platform or device index that could not be used.
    #[error("invalid selection: {reason}")]
    InvalidSelection { reason: String },
    /// A local work size the device cannot run.
    #[error("invalid work size: {reason}")]
    InvalidWorkSize { reason: String },
    /// The kernel output disagreed with the reference.
    #[error("verification failed at #{index}: {actual} != {expected} (expected)")]
    Mismatch {
        index: usize,
        actual: f64,
        expected: f64,
    },
}

impl SmokeError {
    /// Process exit status for this condition.
    ///
    /// With `legacy_exit_code` a verification mismatch exits 0, which is how
    /// the tool historically behaved.
    pub fn exit_status(&self, legacy_exit_code: bool) -> u8 {
        match self {
            SmokeError::NoPlatforms | SmokeError::NoDevices { .. } | SmokeError::Build { .. } => 1,
            SmokeError::InvalidSelection { .. } | SmokeError::InvalidWorkSize { .. } => 2,
            SmokeError::Mismatch { .. } if legacy_exit_code => 0,
            SmokeError::Mismatch { .. } => 3,
        }
    }
}

/// Exit status for a failed run: the first `SmokeError` in the chain decides,
/// anything unclassified is 1.
pub fn exit_status_for(err: &anyhow::Error, legacy_exit_code: bool) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SmokeError>())
        .map_or(1, |e| e.exit_status(legacy_exit_code))
}

pub fn exit_code_for(err: &anyhow::Error, legacy_exit_code: bool) -> ExitCode {
    ExitCode::from(exit_status_for(err, legacy_exit_code))
}
