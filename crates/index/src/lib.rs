//! The concurrent media tree: one lock per directory node, generational
//! mark-and-sweep, and the read queries a gallery needs.

pub mod error;
mod item;
mod model;
mod tree;

pub use crate::item::{ItemKind, ScanId, ScanItem, parent_dir};
pub use crate::model::{
    DirSummary, FileEntry, ImageEntry, Listing, PickedImage, Size, TagInfo, TagStat, VideoEntry,
    tag_stats,
};
pub use crate::tree::DirectoryNode;
