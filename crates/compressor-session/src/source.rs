//! Loading the user's source image.
//!
//! The source is read and decoded exactly once per session. The decoded
//! bitmap is then shared (read-only) by every recompression and by the commit
//! stage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use compressor_core::decode::{decode_image_oriented, read_dimensions};
use compressor_core::{Bitmap, DecodeError};
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};

/// Opaque reference to the image the user picked.
///
/// The platform picker and file provider resolve user content to a local
/// path before it reaches this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef(PathBuf);

impl SourceRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for SourceRef {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&Path> for SourceRef {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<&str> for SourceRef {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

/// The decoded source image and the size of the file it came from.
#[derive(Debug, Clone)]
pub struct RawImage {
    source: SourceRef,
    bitmap: Arc<Bitmap>,
    original_len: u64,
}

impl RawImage {
    pub fn new(source: SourceRef, bitmap: Bitmap, original_len: u64) -> Self {
        Self {
            source,
            bitmap: Arc::new(bitmap),
            original_len,
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Shared handle to the decoded pixels.
    pub fn bitmap(&self) -> Arc<Bitmap> {
        Arc::clone(&self.bitmap)
    }

    /// Length of the encoded source file in bytes.
    pub fn original_len(&self) -> u64 {
        self.original_len
    }
}

#[derive(Debug, Clone)]
pub struct SourceLoader {
    max_source_pixels: u64,
}

impl SourceLoader {
    /// Create a loader that rejects sources larger than a pixel budget.
    ///
    /// # Arguments
    ///
    /// * `max_source_pixels` - largest accepted `width * height`, checked from
    ///   the header before any pixels are decoded
    pub fn new(max_source_pixels: u64) -> Self {
        Self { max_source_pixels }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_source_pixels)
    }

    /// Read and decode `source`.
    ///
    /// File I/O is async; decoding runs on the blocking pool so the caller's
    /// thread never stalls on a large photo.
    ///
    /// # Errors
    ///
    /// * `SessionError::SourceUnavailable` if the file cannot be read
    /// * `SessionError::Decode` if the bytes are not a supported image or the
    ///   image exceeds the pixel limit
    pub async fn load(&self, source: &SourceRef) -> SessionResult<RawImage> {
        debug!("Loading source image: {}", source.path().display());

        let bytes = tokio::fs::read(source.path())
            .await
            .map_err(|e| SessionError::source_unavailable(source.path(), e))?;
        let original_len = bytes.len() as u64;

        let limit = self.max_source_pixels;
        let bitmap = tokio::task::spawn_blocking(move || decode_within_limit(&bytes, limit))
            .await
            .map_err(|e| SessionError::worker(format!("Source decode task failed: {e}")))??;

        info!(
            "Loaded source {} ({} bytes, {}x{})",
            source.path().display(),
            original_len,
            bitmap.width,
            bitmap.height
        );

        Ok(RawImage::new(source.clone(), bitmap, original_len))
    }
}

fn decode_within_limit(bytes: &[u8], limit: u64) -> Result<Bitmap, DecodeError> {
    let (width, height) = read_dimensions(bytes)?;
    if width as u64 * height as u64 > limit {
        return Err(DecodeError::TooLarge {
            width,
            height,
            limit,
        });
    }

    decode_image_oriented(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use compressor_core::encode::encode_jpeg;
    use compressor_core::QualityLevel;

    fn write_jpeg(dir: &Path, width: u32, height: u32) -> PathBuf {
        let bitmap = Bitmap::filled(width, height, [12, 200, 90]);
        let bytes = encode_jpeg(&bitmap, QualityLevel::default()).unwrap();
        let path = dir.join("source.jpg");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_records_original_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jpeg(dir.path(), 24, 12);
        let expected_len = std::fs::metadata(&path).unwrap().len();

        let raw = SourceLoader::new(u64::MAX)
            .load(&SourceRef::new(&path))
            .await
            .unwrap();

        assert_eq!(raw.original_len(), expected_len);
        assert_eq!(raw.bitmap().dimensions(), (24, 12));
        assert_eq!(raw.source().path(), path.as_path());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = SourceLoader::new(u64::MAX)
            .load(&SourceRef::new("/nonexistent/path/photo.jpg"))
            .await;

        assert!(matches!(result, Err(SessionError::SourceUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_load_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = SourceLoader::new(u64::MAX).load(&SourceRef::new(&path)).await;

        assert!(matches!(
            result,
            Err(SessionError::Decode(DecodeError::InvalidFormat))
        ));
    }

    #[tokio::test]
    async fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jpg");
        std::fs::write(&path, b"").unwrap();

        let result = SourceLoader::new(u64::MAX).load(&SourceRef::new(&path)).await;

        assert!(matches!(result, Err(SessionError::Decode(DecodeError::Empty))));
    }

    #[tokio::test]
    async fn test_load_rejects_oversized_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jpeg(dir.path(), 20, 20);

        let result = SourceLoader::new(399).load(&SourceRef::new(&path)).await;

        assert!(matches!(
            result,
            Err(SessionError::Decode(DecodeError::TooLarge { limit: 399, .. }))
        ));
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceRef::new(write_jpeg(dir.path(), 8, 8));
        let loader = SourceLoader::new(u64::MAX);

        let first = loader.load(&source).await.unwrap();
        let second = loader.load(&source).await.unwrap();

        assert_eq!(first.original_len(), second.original_len());
        assert_eq!(*first.bitmap(), *second.bitmap());
    }
}
