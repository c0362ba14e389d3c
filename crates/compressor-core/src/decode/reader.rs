//! Byte-stream decoding into [`Bitmap`]s, with optional EXIF orientation.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::{DynamicImage, ImageReader};

use super::{Bitmap, DecodeError, Orientation};

/// Decode an encoded image into an RGB bitmap, ignoring EXIF orientation.
///
/// This is the preview path: recompressed candidates are produced by our own
/// encoder and never carry orientation metadata.
///
/// # Errors
///
/// * `DecodeError::Empty` if `bytes` is empty
/// * `DecodeError::InvalidFormat` if the format cannot be recognized
/// * `DecodeError::CorruptedFile` if the data is truncated or malformed
pub fn decode_image(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    let img = open(bytes)?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    Ok(Bitmap::from_rgb_image(img.into_rgb8()))
}

/// Decode an encoded image and rotate/flip it upright according to its
/// EXIF orientation tag.
///
/// Used when loading the user's source photo, which may come straight from a
/// camera that stores pixels in sensor order.
pub fn decode_image_oriented(bytes: &[u8]) -> Result<Bitmap, DecodeError> {
    let orientation = get_orientation(bytes);

    let img = open(bytes)?
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let rgb = apply_orientation(img, orientation).into_rgb8();
    Ok(Bitmap::from_rgb_image(rgb))
}

/// Read the width and height from the image header without decoding pixels.
pub fn read_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    open(bytes)?
        .into_dimensions()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))
}

/// Extract the EXIF orientation, defaulting to `Normal` when absent.
pub fn get_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

fn open(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    if reader.format().is_none() {
        return Err(DecodeError::InvalidFormat);
    }

    Ok(reader)
}

fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
