//! Image encoding.
//!
//! The compressor writes a single lossy format: baseline JPEG with a
//! caller-chosen quality. Both the live preview and the final commit go
//! through [`encode_jpeg`].

mod jpeg;

pub use jpeg::{encode_jpeg, EncodeError};
