//! The embedded vector-add kernel and its launch geometry.

use crate::error::SmokeError;

/// Number of doubles in each of the three buffers.
pub const TOTAL_SIZE: usize = 10;

pub const ENTRY_POINT: &str = "sumBuffers";

/// `C[i] = A[i] + B[i]` over the one-dimensional global id.
pub const SUM_BUFFERS_SOURCE: &str = "void kernel sumBuffers(global const double* A,   \
global const double* B, global double* C) {\n\
\n  unsigned long taskIndex = get_global_id(0);\n  \
C[taskIndex] = A[taskIndex] + B[taskIndex];\n}";

/// Picks the work-group size for a dispatch of `global` work-items.
///
/// An explicit size must be non-zero, divide `global` and fit the device's
/// `max_work_group_size`. Without one, the largest divisor of `global` that
/// fits is used.
pub fn resolve_local_size(
    global: usize,
    requested: Option<usize>,
    max_work_group_size: usize,
) -> Result<usize, SmokeError> {
    let max = max_work_group_size.max(1);
    match requested {
        Some(0) => Err(SmokeError::InvalidWorkSize {
            reason: "local work size must be non-zero".to_string(),
        }),
        Some(local) if local > max => Err(SmokeError::InvalidWorkSize {
            reason: format!(
                "local work size {} exceeds the device maximum of {}",
                local, max
            ),
        }),
        Some(local) if global % local != 0 => Err(SmokeError::InvalidWorkSize {
            reason: format!(
                "local work size {} does not divide the global size {}",
                local, global
            ),
        }),
        Some(local) => Ok(local),
        None => Ok((1..=max.min(global.max(1)))
            .rev()
            .find(|l| global % l == 0)
            .unwrap_or(1)),
    }
}
