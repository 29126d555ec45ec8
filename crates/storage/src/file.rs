//! Metadata models returned by storage backends.

use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata returned by [`stat`](crate::StorageBackend::stat).
///
/// The modification timestamp is what the scan pipeline compares (together
/// with the byte size) to decide whether cached video metadata is still
/// trustworthy, so backends should report it at the finest resolution the
/// underlying storage offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }

    /// Modification time as nanoseconds since the Unix epoch.
    ///
    /// Saturates instead of wrapping for timestamps outside the `i64` range;
    /// anything that far out is garbage either way.
    pub fn modified_unix_nanos(&self) -> i64 {
        let nanos = self.modified.unix_timestamp_nanos();
        nanos.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// One entry of a directory listing.
///
/// Discovery only needs the name (for classification) and whether to
/// descend. Anything heavier comes from a follow-up `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}
