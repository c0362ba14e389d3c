//! Session configuration.
//!
//! Everything has a production default; the surrounding application may
//! override fields from its own settings (they deserialize from camelCase
//! JSON), but this crate never persists them.

use std::path::PathBuf;

use compressor_core::QualityLevel;
use serde::Deserialize;

use crate::error::{SessionError, SessionResult};

const DEFAULT_ARTIFACT_NAME: &str = "compressed.jpg";
const DEFAULT_MAX_CONCURRENT_ENCODES: usize = 2;
const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Directory the committed artifact is written into.
    pub output_dir: PathBuf,
    /// File name of the committed artifact; a new commit replaces it.
    pub artifact_name: String,
    /// Quality submitted as soon as the source is loaded.
    pub initial_quality: QualityLevel,
    /// Upper bound on recompressions running at the same time.
    pub max_concurrent_encodes: usize,
    /// Sources with more pixels than this are rejected before decoding.
    pub max_source_pixels: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("compressed"),
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
            initial_quality: QualityLevel::default(),
            max_concurrent_encodes: DEFAULT_MAX_CONCURRENT_ENCODES,
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }
}

impl SessionConfig {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = name.into();
        self
    }

    pub fn with_initial_quality(mut self, quality: QualityLevel) -> Self {
        self.initial_quality = quality;
        self
    }

    pub fn with_max_concurrent_encodes(mut self, count: usize) -> Self {
        self.max_concurrent_encodes = count;
        self
    }

    pub fn with_max_source_pixels(mut self, pixels: u64) -> Self {
        self.max_source_pixels = pixels;
        self
    }

    /// Full path of the committed artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.max_concurrent_encodes == 0 {
            return Err(SessionError::config("maxConcurrentEncodes must be at least 1"));
        }
        if self.max_source_pixels == 0 {
            return Err(SessionError::config("maxSourcePixels must be at least 1"));
        }

        let name = self.artifact_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(SessionError::config(format!(
                "artifactName must be a plain file name, got {:?}",
                self.artifact_name
            )));
        }

        Ok(())
    }
}
