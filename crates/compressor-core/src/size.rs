//! Size comparison between the original file and a recompressed candidate.
//!
//! Sizes are shown in decimal kilobytes (1 kB = 1000 bytes) with one
//! fractional digit.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Shown in place of statistics that cannot be computed.
pub const PLACEHOLDER: &str = "???";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SizeError {
    /// The original size is zero, so no percentage exists.
    #[error("Size delta is undefined for an empty original")]
    DivisionUndefined,
}

/// How a compressed candidate compares to the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeDelta {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    /// `compressed - original`; negative when the candidate is smaller.
    pub delta_bytes: i64,
    /// `round(compressed / original * 100) - 100`.
    pub delta_percent: i64,
}

/// Compare two byte lengths.
///
/// # Arguments
///
/// * `original_bytes` - size of the source file
/// * `compressed_bytes` - size of the recompressed candidate
///
/// # Returns
///
/// The signed byte and percentage change, or
/// `SizeError::DivisionUndefined` when `original_bytes` is zero.
///
/// ```ignore
/// let delta = analyze(1000, 500)?;
/// assert_eq!(delta.delta_percent, -50);
/// ```
pub fn analyze(original_bytes: u64, compressed_bytes: u64) -> Result<SizeDelta, SizeError> {
    if original_bytes == 0 {
        return Err(SizeError::DivisionUndefined);
    }

    let ratio = compressed_bytes as f64 / original_bytes as f64;
    let delta_percent = (ratio * 100.0).round() as i64 - 100;

    Ok(SizeDelta {
        original_bytes,
        compressed_bytes,
        delta_bytes: compressed_bytes as i64 - original_bytes as i64,
        delta_percent,
    })
}

/// Human-readable comparison, or [`PLACEHOLDER`] when undefined.
pub fn describe(original_bytes: u64, compressed_bytes: u64) -> String {
    match analyze(original_bytes, compressed_bytes) {
        Ok(delta) => delta.to_string(),
        Err(SizeError::DivisionUndefined) => PLACEHOLDER.to_string(),
    }
}

/// Format a byte count as `"12.3 kB"`.
pub fn format_kb(bytes: u64) -> String {
    format!("{:.1} kB", bytes as f64 / 1000.0)
}

impl fmt::Display for SizeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({:+.1} kB, {:+}%)",
            format_kb(self.original_bytes),
            format_kb(self.compressed_bytes),
            self.delta_bytes as f64 / 1000.0,
            self.delta_percent
        )
    }
}
