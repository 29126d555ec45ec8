//! Video metadata via an external `ffprobe` process.
//!
//! The scan pipeline and the poster generator both need the same three facts
//! about a video (width, height, duration) and neither wants to link a
//! demuxer for it. This crate shells out to `ffprobe` once per file and
//! parses its JSON report; everything else in the workspace talks to the
//! [`MediaProber`] trait so tests can substitute canned answers.

pub mod error;
mod ffprobe;

pub use crate::ffprobe::{Ffprobe, VideoProbe};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Resolves dimensions and duration for a video file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe a video at an absolute filesystem path (see
    /// `StorageBackend::absolute` in `glimpse-storage`).
    async fn probe(&self, path: &Path) -> Result<VideoProbe>;
}

pub type ProberHandle = Arc<dyn MediaProber + Send + Sync>;
