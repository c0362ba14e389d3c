//! Live recompression scheduling.
//!
//! Every quality change is a submission. Each submission gets a fresh
//! [`Generation`] and a background job that encodes the source bitmap at that
//! quality and decodes the result back into a preview. Jobs run on the
//! blocking pool and may finish in any order.
//!
//! A job's outcome becomes visible only if its generation is still the newest
//! one submitted at the moment it completes. The comparison and the swap of
//! the visible result happen under one mutex, together with the generation
//! bump in [`RecompressionScheduler::submit`], so two completing jobs can
//! never race each other into publishing out of order.
//!
//! Superseded work is cancelled on a best-effort basis: the previous job is
//! aborted on every submit, a job re-checks staleness after it gets a worker
//! permit, and again between encode and decode. None of that is needed for
//! correctness; a job that slips through is dropped at publication.
//! [`RecompressionScheduler::with_cancellation`] turns all three off.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use compressor_core::{Bitmap, Codec, JpegCodec, QualityLevel};
use tokio::runtime::Handle;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// Submission counter. The first submission is generation 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Nothing submitted yet.
    pub const NONE: Generation = Generation(0);

    pub fn get(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recompressed candidate ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    pub generation: Generation,
    pub quality: QualityLevel,
    /// The encoded bytes whose size is reported to the user.
    pub compressed_bytes: Vec<u8>,
    /// `compressed_bytes` decoded back, showing the compression artifacts.
    pub preview: Bitmap,
}

impl CompressionResult {
    pub fn byte_len(&self) -> u64 {
        self.compressed_bytes.len() as u64
    }
}

/// A recompression of the newest generation failed.
///
/// The previous preview stays visible; this is shown alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewWarning {
    pub generation: Generation,
    pub quality: QualityLevel,
    pub message: String,
}

/// What the interaction thread sees.
#[derive(Debug, Clone, Default)]
pub struct PreviewState {
    pub latest_submitted: Generation,
    pub current: Option<Arc<CompressionResult>>,
    pub warning: Option<PreviewWarning>,
}

impl PreviewState {
    pub fn current_generation(&self) -> Generation {
        self.current
            .as_ref()
            .map_or(Generation::NONE, |result| result.generation)
    }

    /// True once the newest submission has produced either a result or a
    /// warning (or nothing was ever submitted).
    pub fn is_settled(&self) -> bool {
        self.current_generation() == self.latest_submitted
            || self
                .warning
                .as_ref()
                .is_some_and(|warning| warning.generation == self.latest_submitted)
    }
}

#[derive(Debug)]
enum Outcome {
    Compressed(CompressionResult),
    Failed(PreviewWarning),
}

impl Outcome {
    fn generation(&self) -> Generation {
        match self {
            Outcome::Compressed(result) => result.generation,
            Outcome::Failed(warning) => warning.generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publication {
    Published,
    Warned,
    Stale,
}

/// The only mutable state shared between the interaction thread and jobs.
#[derive(Debug, Default)]
struct Slot {
    state: PreviewState,
    in_flight: Option<JoinHandle<()>>,
}

impl Slot {
    fn begin(&mut self) -> Generation {
        let generation = self.state.latest_submitted.next();
        self.state.latest_submitted = generation;
        generation
    }

    fn offer(&mut self, outcome: Outcome) -> Publication {
        let generation = outcome.generation();
        if generation != self.state.latest_submitted
            || generation <= self.state.current_generation()
        {
            return Publication::Stale;
        }

        match outcome {
            Outcome::Compressed(result) => {
                self.state.current = Some(Arc::new(result));
                self.state.warning = None;
                Publication::Published
            }
            Outcome::Failed(warning) => {
                self.state.warning = Some(warning);
                Publication::Warned
            }
        }
    }
}

struct Shared {
    /// Lock-free mirror of `slot.state.latest_submitted`, read by jobs to
    /// bail out early. Never used to decide publication.
    latest: AtomicU64,
    slot: Mutex<Slot>,
    state_tx: watch::Sender<PreviewState>,
}

impl Shared {
    fn new() -> Self {
        let (state_tx, _) = watch::channel(PreviewState::default());
        Self {
            latest: AtomicU64::new(Generation::NONE.get()),
            slot: Mutex::new(Slot::default()),
            state_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_superseded(&self, generation: Generation) -> bool {
        self.latest.load(Ordering::Acquire) != generation.get()
    }

    fn publish(&self, outcome: Outcome) -> Publication {
        let generation = outcome.generation();
        let mut slot = self.lock();

        let publication = slot.offer(outcome);
        match publication {
            Publication::Published => {
                debug!("Publishing recompression {generation}");
            }
            Publication::Warned => {
                if let Some(warning) = &slot.state.warning {
                    warn!(
                        "Recompression {} at quality {} failed: {}",
                        warning.generation, warning.quality, warning.message
                    );
                }
            }
            Publication::Stale => {
                debug!(
                    "Dropping recompression {generation}, superseded by {}",
                    slot.state.latest_submitted
                );
                return publication;
            }
        }

        self.state_tx.send_replace(slot.state.clone());
        publication
    }
}

/// Runs recompressions of one source bitmap and keeps the newest one visible.
pub struct RecompressionScheduler<C: Codec = JpegCodec> {
    bitmap: Arc<Bitmap>,
    codec: Arc<C>,
    permits: Arc<Semaphore>,
    runtime: Handle,
    shared: Arc<Shared>,
    cancel_superseded: bool,
}

impl<C: Codec> RecompressionScheduler<C> {
    /// Create a scheduler on the current Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `bitmap` - the decoded source every job recompresses
    /// * `codec` - encoder and decoder for the candidates
    /// * `max_concurrent` - most encodes running at once (at least 1)
    ///
    /// # Errors
    ///
    /// `SessionError::NoRuntime` when called outside a Tokio runtime.
    pub fn new(bitmap: Arc<Bitmap>, codec: Arc<C>, max_concurrent: usize) -> SessionResult<Self> {
        let runtime = Handle::try_current().map_err(|e| SessionError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(bitmap, codec, max_concurrent, runtime))
    }

    pub fn with_runtime(
        bitmap: Arc<Bitmap>,
        codec: Arc<C>,
        max_concurrent: usize,
        runtime: Handle,
    ) -> Self {
        Self {
            bitmap,
            codec,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            runtime,
            shared: Arc::new(Shared::new()),
            cancel_superseded: true,
        }
    }

    /// Enable or disable best-effort cancellation of superseded jobs.
    ///
    /// Enabled by default. When disabled every submitted job runs its encode
    /// and decode to the end and offers the outcome for publication, where
    /// anything superseded is dropped.
    ///
    /// # Arguments
    ///
    /// * `enabled` - abort and skip superseded jobs when `true`
    pub fn with_cancellation(mut self, enabled: bool) -> Self {
        self.cancel_superseded = enabled;
        self
    }

    /// Request a preview at `quality`. Never blocks on the recompression.
    ///
    /// # Returns
    ///
    /// The generation assigned to this request. Its result becomes visible
    /// only if no later request was submitted before it completes.
    pub fn submit(&self, quality: QualityLevel) -> Generation {
        let mut slot = self.shared.lock();

        let generation = slot.begin();
        self.shared.latest.store(generation.get(), Ordering::Release);

        if let Some(previous) = slot.in_flight.take() {
            if self.cancel_superseded {
                previous.abort();
            }
        }

        debug!("Submitting recompression {generation} at quality {quality}");
        let job = Job {
            shared: Arc::clone(&self.shared),
            codec: Arc::clone(&self.codec),
            bitmap: Arc::clone(&self.bitmap),
            permits: Arc::clone(&self.permits),
            generation,
            quality,
            cancel_superseded: self.cancel_superseded,
        };
        slot.in_flight = Some(self.runtime.spawn(job.run()));

        self.shared.state_tx.send_replace(slot.state.clone());
        generation
    }

    pub fn state(&self) -> PreviewState {
        self.shared.lock().state.clone()
    }

    /// The visible result, if any recompression has completed.
    pub fn current(&self) -> Option<Arc<CompressionResult>> {
        self.shared.lock().state.current.clone()
    }

    pub fn latest_submitted(&self) -> Generation {
        self.shared.lock().state.latest_submitted
    }

    /// Receive every state change (submissions, results, warnings).
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.shared.state_tx.subscribe()
    }

    /// Wait until the newest submission has produced a result or a warning.
    pub async fn settled(&self) -> PreviewState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(PreviewState::is_settled).await {
            Ok(state) => Some((*state).clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.state())
    }
}

impl<C: Codec> Drop for RecompressionScheduler<C> {
    fn drop(&mut self) {
        if let Some(task) = self.shared.lock().in_flight.take() {
            task.abort();
        }
    }
}

struct Job<C> {
    shared: Arc<Shared>,
    codec: Arc<C>,
    bitmap: Arc<Bitmap>,
    permits: Arc<Semaphore>,
    generation: Generation,
    quality: QualityLevel,
    cancel_superseded: bool,
}

impl<C: Codec> Job<C> {
    async fn run(self) {
        let Job {
            shared,
            codec,
            bitmap,
            permits,
            generation,
            quality,
            cancel_superseded,
        } = self;

        let Ok(permit) = permits.acquire_owned().await else {
            return;
        };
        if cancel_superseded && shared.is_superseded(generation) {
            debug!("Skipping recompression {generation}, superseded before start");
            return;
        }

        // The permit moves into the blocking closure so that an aborted job
        // keeps holding it until its encode really stops.
        let worker_shared = Arc::clone(&shared);
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let superseded = || cancel_superseded && worker_shared.is_superseded(generation);
            compress(codec.as_ref(), &bitmap, quality, generation, superseded)
        })
        .await;

        let outcome = match joined {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return,
            Err(e) => Outcome::Failed(PreviewWarning {
                generation,
                quality,
                message: SessionError::worker(e).to_string(),
            }),
        };
        shared.publish(outcome);
    }
}

fn compress<C: Codec>(
    codec: &C,
    bitmap: &Bitmap,
    quality: QualityLevel,
    generation: Generation,
    superseded: impl Fn() -> bool,
) -> Option<Outcome> {
    let started = Instant::now();
    let failed = |err: SessionError| {
        Outcome::Failed(PreviewWarning {
            generation,
            quality,
            message: err.to_string(),
        })
    };

    let compressed_bytes = match codec.encode(bitmap, quality) {
        Ok(bytes) => bytes,
        Err(e) => return Some(failed(e.into())),
    };

    if superseded() {
        debug!("Abandoning recompression {generation} before preview decode");
        return None;
    }

    let preview = match codec.decode(&compressed_bytes) {
        Ok(preview) => preview,
        Err(e) => return Some(failed(e.into())),
    };

    debug!(
        "Recompressed {generation} at quality {quality}: {} bytes in {:?}",
        compressed_bytes.len(),
        started.elapsed()
    );

    Some(Outcome::Compressed(CompressionResult {
        generation,
        quality,
        compressed_bytes,
        preview,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(value: i64) -> QualityLevel {
        QualityLevel::new(value).unwrap()
    }

    fn compressed(generation: Generation, quality: i64) -> Outcome {
        Outcome::Compressed(CompressionResult {
            generation,
            quality: q(quality),
            compressed_bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            preview: Bitmap::filled(1, 1, [0, 0, 0]),
        })
    }

    fn failed(generation: Generation, quality: i64) -> Outcome {
        Outcome::Failed(PreviewWarning {
            generation,
            quality: q(quality),
            message: "boom".to_string(),
        })
    }

    #[test]
    fn test_generations_increase_from_one() {
        let mut slot = Slot::default();
        assert_eq!(slot.begin().get(), 1);
        assert_eq!(slot.begin().get(), 2);
        assert_eq!(slot.state.latest_submitted.get(), 2);
    }

    #[test]
    fn test_latest_result_is_published() {
        let mut slot = Slot::default();
        let g1 = slot.begin();

        assert_eq!(slot.offer(compressed(g1, 80)), Publication::Published);
        assert_eq!(slot.state.current_generation(), g1);
        assert!(slot.state.is_settled());
    }

    #[test]
    fn test_older_result_finishing_late_is_dropped() {
        let mut slot = Slot::default();
        let g1 = slot.begin();
        let g2 = slot.begin();

        assert_eq!(slot.offer(compressed(g2, 60)), Publication::Published);
        assert_eq!(slot.offer(compressed(g1, 50)), Publication::Stale);

        let current = slot.state.current.as_ref().unwrap();
        assert_eq!(current.generation, g2);
        assert_eq!(current.quality, q(60));
    }

    #[test]
    fn test_older_result_finishing_first_is_dropped() {
        let mut slot = Slot::default();
        let g1 = slot.begin();
        let g2 = slot.begin();

        assert_eq!(slot.offer(compressed(g1, 50)), Publication::Stale);
        assert!(slot.state.current.is_none());
        assert!(!slot.state.is_settled());

        assert_eq!(slot.offer(compressed(g2, 60)), Publication::Published);
    }

    #[test]
    fn test_current_failure_keeps_previous_preview() {
        let mut slot = Slot::default();
        let g1 = slot.begin();
        slot.offer(compressed(g1, 90));
        let g2 = slot.begin();

        assert_eq!(slot.offer(failed(g2, 40)), Publication::Warned);

        assert_eq!(slot.state.current_generation(), g1);
        assert_eq!(slot.state.warning.as_ref().unwrap().generation, g2);
        assert!(slot.state.is_settled());
    }

    #[test]
    fn test_stale_failure_is_swallowed() {
        let mut slot = Slot::default();
        let g1 = slot.begin();
        let g2 = slot.begin();
        slot.offer(compressed(g2, 70));

        assert_eq!(slot.offer(failed(g1, 30)), Publication::Stale);
        assert!(slot.state.warning.is_none());
    }

    #[test]
    fn test_success_clears_warning() {
        let mut slot = Slot::default();
        let g1 = slot.begin();
        slot.offer(failed(g1, 10));
        let g2 = slot.begin();

        slot.offer(compressed(g2, 20));
        assert!(slot.state.warning.is_none());
    }

    #[test]
    fn test_duplicate_offer_is_stale() {
        let mut slot = Slot::default();
        let g1 = slot.begin();

        assert_eq!(slot.offer(compressed(g1, 80)), Publication::Published);
        assert_eq!(slot.offer(compressed(g1, 80)), Publication::Stale);
    }

    #[test]
    fn test_idle_state_is_settled() {
        assert!(PreviewState::default().is_settled());
    }

    #[tokio::test]
    async fn test_submit_publishes_preview() {
        let bitmap = Arc::new(Bitmap::filled(32, 16, [40, 80, 120]));
        let scheduler = RecompressionScheduler::new(bitmap, Arc::new(JpegCodec), 2).unwrap();

        let generation = scheduler.submit(q(70));
        let state = scheduler.settled().await;

        let current = state.current.unwrap();
        assert_eq!(current.generation, generation);
        assert_eq!(current.quality, q(70));
        assert_eq!(current.preview.dimensions(), (32, 16));
        assert!(current.byte_len() > 0);
    }

    #[tokio::test]
    async fn test_empty_bitmap_surfaces_warning() {
        let bitmap = Arc::new(Bitmap::new(0, 0, vec![]));
        let scheduler = RecompressionScheduler::new(bitmap, Arc::new(JpegCodec), 1).unwrap();

        let generation = scheduler.submit(q(50));
        let state = scheduler.settled().await;

        assert!(state.current.is_none());
        let warning = state.warning.unwrap();
        assert_eq!(warning.generation, generation);
        assert!(warning.message.starts_with("Encode error"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_without_cancellation_newest_still_wins() {
        let bitmap = Arc::new(Bitmap::filled(32, 16, [40, 80, 120]));
        let scheduler = RecompressionScheduler::new(bitmap, Arc::new(JpegCodec), 4)
            .unwrap()
            .with_cancellation(false);

        for quality in [90, 30, 60] {
            scheduler.submit(q(quality));
        }
        let state = scheduler.settled().await;

        let current = state.current.unwrap();
        assert_eq!(current.generation.get(), 3);
        assert_eq!(current.quality, q(60));
    }

    #[test]
    fn test_new_without_runtime_fails() {
        let bitmap = Arc::new(Bitmap::filled(1, 1, [0, 0, 0]));
        let result = RecompressionScheduler::new(bitmap, Arc::new(JpegCodec), 1);
        assert!(matches!(result, Err(SessionError::NoRuntime(_))));
    }
}
