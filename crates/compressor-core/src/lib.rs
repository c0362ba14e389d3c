//! Compressor Core - lossy recompression building blocks
//!
//! This crate provides the synchronous pieces of the picture compressor:
//! decoding source images into bitmaps, JPEG encoding at a chosen quality,
//! and comparing the resulting sizes. Everything here is pure and safe to call
//! from any thread; scheduling and I/O live in `compressor-session`.

pub mod codec;
pub mod decode;
pub mod encode;
pub mod quality;
pub mod size;

pub use codec::{Codec, JpegCodec};
pub use decode::{Bitmap, DecodeError};
pub use encode::EncodeError;
pub use quality::{QualityError, QualityLevel};
pub use size::{analyze, SizeDelta, SizeError};
