//! Staged scan pipeline keeping the media tree in sync with storage.
//!
//! A scan is a stream of items flowing through worker pools: discovery walks
//! the origin backend (or a persisted snapshot replays without it), a probe
//! stage fills dimensions and video durations, an enrich stage attaches
//! cached tags and captions, and mutators fold everything into the shared
//! [`DirectoryNode`](glimpse_index::DirectoryNode) tree under one scan
//! generation. Entries the stream never touched are swept once it ends.
//!
//! [`Scanner`] drives a single scan or restore; [`ScanScheduler`] runs them
//! on demand behind a freshness window; [`MetaBackfill`] covers the gap when
//! a display path needs video metadata the tree does not have yet.

pub mod error;

mod backfill;
mod discover;
mod pipeline;
mod scanner;
mod scheduler;
#[cfg(test)]
mod testutil;

pub use crate::backfill::{CachedDurations, MetaBackfill};
pub use crate::scanner::Scanner;
pub use crate::scheduler::{DEFAULT_SCAN_WINDOW, ScanScheduler};
