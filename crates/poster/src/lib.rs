//! Background poster-frame extraction for indexed videos.
//!
//! Videos don't have a browsable still until something makes one. The scan
//! pipeline pushes every poster-less video onto a [`PosterQueue`]; a small
//! worker pool behind it drives ffmpeg to pull a single keyframe per video
//! into the cache, retrying once with a duration-tiered seek when the cheap
//! attempt comes back empty. Everything here is best-effort: a failed poster
//! is logged and forgotten until the next scan enqueues it again.

pub mod error;
mod generate;
mod queue;

pub use crate::generate::{
    DurationSource, Ffmpeg, FfmpegPosterGenerator, FrameExtractor, PosterGenerator, offset_for,
    poster_exists, poster_path,
};
pub use crate::queue::{PosterQueue, PosterQueueOptions};
