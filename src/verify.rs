use crate::error::SmokeError;

/// Host input fed to both A and B: `i * 0.5`.
pub fn input_values(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64 * 0.5).collect()
}

/// `input[i] + input[i]`, which is exactly `i` for [`input_values`].
pub fn expected_value(index: usize) -> f64 {
    index as f64
}

/// Finds the first element of `results` that differs from its expected value.
pub fn verify(results: &[f64]) -> Result<(), SmokeError> {
    match results
        .iter()
        .enumerate()
        .find(|&(i, &actual)| actual != expected_value(i))
    {
        Some((index, &actual)) => Err(SmokeError::Mismatch {
            index,
            actual,
            expected: expected_value(index),
        }),
        None => Ok(()),
    }
}
