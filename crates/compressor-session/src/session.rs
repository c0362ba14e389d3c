//! One compression session: load a picture, tune the quality, commit.

use std::path::PathBuf;
use std::sync::Arc;

use compressor_core::size::{self, PLACEHOLDER};
use compressor_core::{Codec, JpegCodec, QualityLevel, SizeDelta, SizeError};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::commit::{CommitStage, CommittedArtifact};
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::scheduler::{CompressionResult, Generation, PreviewState, RecompressionScheduler};
use crate::source::{RawImage, SourceLoader, SourceRef};

/// What the results view shows after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub source: PathBuf,
    pub original_bytes: u64,
    pub artifact: CommittedArtifact,
    pub delta: Option<SizeDelta>,
}

/// Owns the source image, the live preview scheduler and the commit stage.
///
/// Meant to be driven from a single interaction thread: quality changes go
/// in through [`set_quality`](Self::set_quality), previews come out through
/// [`preview_state`](Self::preview_state) or [`subscribe`](Self::subscribe).
pub struct CompressionSession<C: Codec = JpegCodec> {
    source: RawImage,
    quality: QualityLevel,
    scheduler: RecompressionScheduler<C>,
    commit: CommitStage<C>,
}

impl CompressionSession<JpegCodec> {
    /// Open a session with the JPEG codec.
    ///
    /// # Arguments
    ///
    /// * `config` - output location, initial quality and resource limits
    /// * `source` - the picture the user picked
    pub async fn open(config: SessionConfig, source: SourceRef) -> SessionResult<Self> {
        Self::open_with_codec(config, source, Arc::new(JpegCodec)).await
    }
}

impl<C: Codec> CompressionSession<C> {
    /// Load `source` and immediately request a preview at the configured
    /// initial quality.
    ///
    /// Fails if the configuration is invalid or the source cannot be loaded;
    /// there is nothing to work with in either case.
    pub async fn open_with_codec(
        config: SessionConfig,
        source: SourceRef,
        codec: Arc<C>,
    ) -> SessionResult<Self> {
        config.validate()?;

        let raw = SourceLoader::from_config(&config).load(&source).await?;
        let scheduler = RecompressionScheduler::new(
            raw.bitmap(),
            Arc::clone(&codec),
            config.max_concurrent_encodes,
        )?;
        let commit = CommitStage::with_codec(&config, codec);

        let quality = config.initial_quality;
        scheduler.submit(quality);
        info!(
            "Opened session for {} at quality {}",
            source.path().display(),
            quality
        );

        Ok(Self {
            source: raw,
            quality,
            scheduler,
            commit,
        })
    }

    pub fn source(&self) -> &RawImage {
        &self.source
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    /// Change the quality. Repeating the current value does not resubmit.
    pub fn set_quality(&mut self, quality: QualityLevel) -> Generation {
        if quality == self.quality {
            return self.scheduler.latest_submitted();
        }
        self.quality = quality;
        self.scheduler.submit(quality)
    }

    pub fn preview_state(&self) -> PreviewState {
        self.scheduler.state()
    }

    pub fn current_preview(&self) -> Option<Arc<CompressionResult>> {
        self.scheduler.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.scheduler.subscribe()
    }

    /// Wait for the preview of the most recent quality (or its warning).
    pub async fn settled(&self) -> PreviewState {
        self.scheduler.settled().await
    }

    /// Size comparison for the visible preview; `None` before the first
    /// preview or when the original is empty.
    pub fn size_delta(&self) -> Option<SizeDelta> {
        let preview = self.scheduler.current()?;
        match size::analyze(self.source.original_len(), preview.byte_len()) {
            Ok(delta) => Some(delta),
            Err(SizeError::DivisionUndefined) => {
                debug!("Size delta undefined for an empty original");
                None
            }
        }
    }

    /// Display line for the size comparison, with a placeholder when there
    /// is nothing to compare yet.
    pub fn describe_size(&self) -> String {
        match self.scheduler.current() {
            Some(preview) => size::describe(self.source.original_len(), preview.byte_len()),
            None => PLACEHOLDER.to_string(),
        }
    }

    /// Encode the source at the current quality and write the artifact.
    pub async fn commit(&self) -> SessionResult<CommittedArtifact> {
        self.commit.commit(self.source.bitmap(), self.quality).await
    }

    /// Commit at the current quality and build what the results view needs.
    ///
    /// A failed commit leaves the session untouched, so the caller can fix
    /// the cause and call this again. Drop the session once it succeeds.
    ///
    /// # Returns
    ///
    /// The committed artifact with the size comparison against the source.
    ///
    /// # Errors
    ///
    /// * `SessionError::Encode` if the source cannot be encoded
    /// * `SessionError::Write` if the artifact cannot be written
    pub async fn finish(&self) -> SessionResult<ResultSummary> {
        let artifact = self.commit().await?;
        let original_bytes = self.source.original_len();

        Ok(ResultSummary {
            source: self.source.source().path().to_path_buf(),
            original_bytes,
            delta: size::analyze(original_bytes, artifact.byte_length).ok(),
            artifact,
        })
    }
}
