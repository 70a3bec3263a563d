//! Turning user input into a device index.

use crate::error::SmokeError;

use anyhow::{Context, Result};
use std::io::BufRead;

/// Checks that `index` addresses one of `count` entries.
pub fn check_index(kind: &str, index: usize, count: usize) -> Result<usize, SmokeError> {
    if index < count {
        Ok(index)
    } else {
        Err(SmokeError::InvalidSelection {
            reason: format!(
                "{} index {} out of range (found {} {}{})",
                kind,
                index,
                count,
                kind,
                if count == 1 { "" } else { "s" }
            ),
        })
    }
}

/// Reads one device index from `input` and bounds-checks it against `count`.
///
/// Blank lines are skipped; the first whitespace-separated token is the index.
pub fn read_device_index<R: BufRead>(input: &mut R, count: usize) -> Result<usize> {
    let mut line = String::new();
    let token = loop {
        line.clear();
        let read = input
            .read_line(&mut line)
            .context("Failed to read device selection")?;
        if read == 0 {
            return Err(SmokeError::InvalidSelection {
                reason: "no device id given (end of input)".to_string(),
            }
            .into());
        }
        if let Some(token) = line.split_whitespace().next() {
            break token.to_string();
        }
    };

    let index: usize = token.parse().map_err(|_| SmokeError::InvalidSelection {
        reason: format!("'{}' is not a device id", token),
    })?;
    Ok(check_index("device", index, count)?)
}
