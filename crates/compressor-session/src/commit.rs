//! Writing the final compressed artifact.
//!
//! The commit does its own encode from the in-memory bitmap rather than
//! reusing preview bytes, so it is independent of whatever the scheduler is
//! doing. Encoding is deterministic, so the result is byte-identical to the
//! preview at the same quality anyway.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use compressor_core::{Bitmap, Codec, JpegCodec, QualityLevel};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// The committed file, handed on to whatever displays the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedArtifact {
    pub path: PathBuf,
    pub quality: QualityLevel,
    pub byte_length: u64,
}

impl CommittedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct CommitStage<C: Codec = JpegCodec> {
    codec: Arc<C>,
    output_dir: PathBuf,
    artifact_name: String,
}

impl CommitStage<JpegCodec> {
    /// Create a commit stage writing JPEGs to the configured artifact path.
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_codec(config, Arc::new(JpegCodec))
    }
}

impl<C: Codec> CommitStage<C> {
    /// Create a commit stage using `codec` for the final encode.
    ///
    /// # Arguments
    ///
    /// * `config` - supplies `output_dir` and `artifact_name`
    /// * `codec` - the same codec the previews use, so the artifact matches
    ///   what the user saw
    pub fn with_codec(config: &SessionConfig, codec: Arc<C>) -> Self {
        Self {
            codec,
            output_dir: config.output_dir.clone(),
            artifact_name: config.artifact_name.clone(),
        }
    }

    /// Where a successful commit puts the artifact.
    pub fn target_path(&self) -> PathBuf {
        self.output_dir.join(&self.artifact_name)
    }

    /// Encode `bitmap` at `quality` and replace the artifact with the result.
    ///
    /// The bytes go to a staging file next to the target first and are
    /// renamed over it only once fully written and synced. On any failure the
    /// staging file is removed and a previous artifact is left as it was.
    ///
    /// # Errors
    ///
    /// * `SessionError::Encode` if the bitmap cannot be encoded
    /// * `SessionError::Write` if the directory, staging file or rename fails
    pub async fn commit(
        &self,
        bitmap: Arc<Bitmap>,
        quality: QualityLevel,
    ) -> SessionResult<CommittedArtifact> {
        let codec = Arc::clone(&self.codec);
        let bytes = tokio::task::spawn_blocking(move || codec.encode(&bitmap, quality))
            .await
            .map_err(|e| SessionError::worker(format!("Commit encode task failed: {e}")))??;

        let target = self.target_path();
        write_replacing(&self.output_dir, &target, &bytes).await?;

        info!(
            "Committed {} ({} bytes at quality {})",
            target.display(),
            bytes.len(),
            quality
        );

        Ok(CommittedArtifact {
            path: target,
            quality,
            byte_length: bytes.len() as u64,
        })
    }
}

async fn write_replacing(dir: &Path, target: &Path, bytes: &[u8]) -> SessionResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SessionError::write(dir, e))?;

    let staging = staging_path(target);
    debug!("Staging artifact at {}", staging.display());

    if let Err(e) = write_synced(&staging, bytes).await {
        discard(&staging).await;
        return Err(SessionError::write(&staging, e));
    }

    if let Err(e) = tokio::fs::rename(&staging, target).await {
        discard(&staging).await;
        return Err(SessionError::write(target, e));
    }

    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove staging file {}: {}", path.display(), e);
        }
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(".{name}.{}-{seq}.tmp", std::process::id()))
}
