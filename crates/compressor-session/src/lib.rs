//! Compressor Session - interactive recompression on a Tokio runtime
//!
//! This crate drives the pieces from `compressor-core` for one picture:
//!
//! - `source` - read and decode the picked image once
//! - `scheduler` - re-encode on every quality change, newest request wins
//! - `commit` - write the final JPEG without leaving partial files behind
//! - `session` - the facade tying the three together
//! - `config`, `error`, `telemetry` - configuration, errors and tracing setup
//!
//! # Usage
//!
//! ```ignore
//! let mut session = CompressionSession::open(SessionConfig::default(), "photo.jpg".into()).await?;
//! session.set_quality(QualityLevel::new(60)?);
//! session.settled().await;
//! println!("{}", session.describe_size());
//! let summary = session.finish().await?;
//! ```

pub mod commit;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod telemetry;

pub use commit::{CommitStage, CommittedArtifact};
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use scheduler::{
    CompressionResult, Generation, PreviewState, PreviewWarning, RecompressionScheduler,
};
pub use session::{CompressionSession, ResultSummary};
pub use source::{RawImage, SourceLoader, SourceRef};
pub use telemetry::init_tracing;

pub use compressor_core::QualityLevel;
