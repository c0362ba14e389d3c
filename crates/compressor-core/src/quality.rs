//! Lossy compression quality.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QualityError {
    #[error("Quality {0} is outside the range 1..=100")]
    OutOfRange(i64),
}

/// JPEG quality in `1..=100`, where 100 is the highest quality.
///
/// A fresh session starts at [`QualityLevel::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct QualityLevel(u8);

impl QualityLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Checked constructor.
    pub fn new(value: i64) -> Result<Self, QualityError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(QualityError::OutOfRange(value))
        }
    }

    /// Saturating constructor for slider positions, which may arrive as
    /// floats slightly outside the range.
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.round().clamp(Self::MIN as f32, Self::MAX as f32) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for QualityLevel {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<i64> for QualityLevel {
    type Error = QualityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QualityLevel> for u8 {
    fn from(quality: QualityLevel) -> Self {
        quality.0
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_max() {
        assert_eq!(QualityLevel::default().get(), 100);
    }

    #[test]
    fn test_new_accepts_bounds() {
        assert_eq!(QualityLevel::new(1).unwrap().get(), 1);
        assert_eq!(QualityLevel::new(100).unwrap().get(), 100);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert_eq!(QualityLevel::new(0), Err(QualityError::OutOfRange(0)));
        assert_eq!(QualityLevel::new(101), Err(QualityError::OutOfRange(101)));
        assert_eq!(QualityLevel::new(-5), Err(QualityError::OutOfRange(-5)));
    }

    #[test]
    fn test_clamped() {
        assert_eq!(QualityLevel::clamped(0.2).get(), 1);
        assert_eq!(QualityLevel::clamped(49.6).get(), 50);
        assert_eq!(QualityLevel::clamped(250.0).get(), 100);
        assert_eq!(QualityLevel::clamped(f32::NAN).get(), 100);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            QualityError::OutOfRange(0).to_string(),
            "Quality 0 is outside the range 1..=100"
        );
    }
}
