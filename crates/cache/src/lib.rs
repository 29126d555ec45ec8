//! Diff-aware JSON persistence for the media tree.
//!
//! The cache is not the source of truth - the filesystem is. Everything here
//! can be deleted and rebuilt by one full scan; its job is to make the next
//! scan and the next cold start cheap.
//!
//! # Artifacts
//! Five independent JSON documents on the cache backend:
//! - **Structural snapshot** (`media.json`): the flattened tree, rewritten
//!   on every save and replayed through the pipeline on warm start.
//! - **Knowledge maps** (`media-size.json`, `media-tag.json`,
//!   `media-caption.json`, `video-meta.json`): path-keyed lookups that let
//!   pipeline stages skip probing unchanged files. Each is written only when
//!   its content actually changed.

pub mod error;
mod policy;
mod store;

pub use crate::policy::{TAG_MIN_VALUE, TagPolicy};
pub use crate::store::{
    CAPTION_FILE, CacheStore, SIZE_FILE, SNAPSHOT_FILE, TAG_FILE, VIDEO_META_FILE, VideoMeta,
};
