//! Error types for a compression session.
//!
//! Codec failures keep their own types from `compressor-core` and are wrapped
//! here; everything that touches the filesystem or the runtime is added on
//! top.

use std::io;
use std::path::{Path, PathBuf};

use compressor_core::{DecodeError, EncodeError};
use thiserror::Error;

/// Main error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The source reference could not be opened or read.
    #[error("Source unavailable: {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The source or a recompressed candidate is not a valid image.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The bitmap could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The committed artifact could not be written.
    #[error("Write error: {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    /// A blocking worker panicked or was cancelled.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// No Tokio runtime is available to run background work.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// Session configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Convenience result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    pub fn source_unavailable(path: impl AsRef<Path>, err: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn write(path: impl AsRef<Path>, err: io::Error) -> Self {
        Self::Write {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    pub fn worker(msg: impl std::fmt::Display) -> Self {
        Self::Worker(msg.to_string())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_unavailable_display() {
        let err = SessionError::source_unavailable(
            "/photos/missing.jpg",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        assert_eq!(
            err.to_string(),
            "Source unavailable: /photos/missing.jpg: not found"
        );
    }

    #[test]
    fn test_codec_errors_convert() {
        let err: SessionError = DecodeError::Empty.into();
        assert!(matches!(err, SessionError::Decode(DecodeError::Empty)));

        let err: SessionError = EncodeError::InvalidDimensions {
            width: 0,
            height: 3,
        }
        .into();
        assert!(matches!(err, SessionError::Encode(_)));
    }
}
