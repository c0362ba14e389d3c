//! JPEG encoding.
//!
//! Uses the `image` crate's baseline JPEG encoder. Encoding is deterministic:
//! the same bitmap at the same quality always yields the same bytes, which is
//! what lets a committed artifact match the preview the user settled on.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use thiserror::Error;

use crate::decode::Bitmap;
use crate::QualityLevel;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 3), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode a bitmap to JPEG bytes at the given quality.
///
/// # Arguments
///
/// * `bitmap` - RGB pixels, 3 bytes per pixel in row-major order
/// * `quality` - JPEG quality, 1 (smallest) to 100 (best)
///
/// # Returns
///
/// Baseline JPEG bytes with no metadata, or an error if the bitmap is
/// malformed or the encoder fails.
///
/// # Quality Guidelines
///
/// * 90-100: High quality, little visible loss
/// * 60-90: Good quality, the usual range for sharing
/// * Below 60: Visible blocking and ringing artifacts
///
/// Output size tends to grow with quality but is not guaranteed to be
/// monotonic; callers must not rely on ordering between sizes.
pub fn encode_jpeg(bitmap: &Bitmap, quality: QualityLevel) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = bitmap.dimensions();
    let pixels = &bitmap.pixels;

    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected = width as usize * height as usize * 3;
    if pixels.len() != expected {
        return Err(EncodeError::InvalidPixelData {
            expected,
            actual: pixels.len(),
        });
    }

    let mut buffer = Cursor::new(Vec::with_capacity(expected / 8));
    JpegEncoder::new_with_quality(&mut buffer, quality.get())
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}
