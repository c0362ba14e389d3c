//! Codec abstraction.
//!
//! The [`Codec`] trait is what the recompression scheduler and the commit
//! stage depend on. [`JpegCodec`] is the only production implementation; the
//! trait exists so callers can substitute instrumented codecs in tests (for
//! example, to force out-of-order completion).

use crate::decode::{self, Bitmap, DecodeError};
use crate::encode::{self, EncodeError};
use crate::QualityLevel;

/// Stateless lossy encode / decode pair.
///
/// Implementations must be callable concurrently from several worker threads
/// with different inputs.
pub trait Codec: Send + Sync + 'static {
    /// Encode `bitmap` at `quality`.
    fn encode(&self, bitmap: &Bitmap, quality: QualityLevel) -> Result<Vec<u8>, EncodeError>;

    /// Decode bytes previously produced by [`Codec::encode`].
    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, DecodeError>;
}

/// Baseline JPEG via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegCodec;

impl Codec for JpegCodec {
    fn encode(&self, bitmap: &Bitmap, quality: QualityLevel) -> Result<Vec<u8>, EncodeError> {
        encode::encode_jpeg(bitmap, quality)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bitmap, DecodeError> {
        decode::decode_image(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_codec_roundtrip_keeps_dimensions() {
        let bitmap = Bitmap::filled(33, 17, [90, 160, 30]);
        let bytes = JpegCodec.encode(&bitmap, QualityLevel::new(80).unwrap()).unwrap();

        let preview = JpegCodec.decode(&bytes).unwrap();
        assert_eq!(preview.dimensions(), (33, 17));
    }

    #[test]
    fn test_jpeg_codec_rejects_empty_bitmap() {
        let result = JpegCodec.encode(&Bitmap::new(0, 0, vec![]), QualityLevel::default());
        assert!(matches!(result, Err(EncodeError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_jpeg_codec_rejects_empty_bytes() {
        assert_eq!(JpegCodec.decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn test_codec_is_object_safe() {
        let codec: Box<dyn Codec> = Box::new(JpegCodec);
        let bitmap = Bitmap::filled(4, 4, [0, 0, 0]);
        assert!(codec.encode(&bitmap, QualityLevel::default()).is_ok());
    }
}
