//! Image decoding.
//!
//! Two consumers share this module:
//! - the source loader, which decodes the user's photo once per session and
//!   wants it upright ([`decode_image_oriented`]);
//! - the recompression preview, which decodes every candidate JPEG the encoder
//!   produces ([`decode_image`]).
//!
//! Any format the `image` crate is built with can be read; only JPEG is ever
//! written.

mod reader;
mod types;

pub use reader::{decode_image, decode_image_oriented, get_orientation, read_dimensions};
pub use types::{Bitmap, DecodeError, Orientation};
