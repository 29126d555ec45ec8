//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for storage operations across different backends (local
//! filesystem for the media library and its cache, in-memory for tests).

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::{DirEntry, FileInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Unified interface for storage backends.
///
/// All storage operations are asynchronous and take paths relative to the
/// backend's root, validated through [`validate_path`](crate::validate_path)
/// by every implementation. It's a glorified CRUD interface, but in ✨Rust✨
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use glimpse_storage::{StorageBackend, error::Result};
///
/// async fn size_of_cover(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("albums/2024/cover.jpg");
///     if backend.exists(path).await? {
///         let info = backend.stat(path).await?;
///         Ok(info.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List the immediate entries of a directory; `None` lists the root.
    ///
    /// Listing never recurses; the scan pipeline walks the tree itself so
    /// it can skip excluded subtrees before descending into them. Returns
    /// [`NotFound`](crate::error::ErrorKind::NotFound) if the directory does
    /// not exist.
    async fn read_dir(&self, dir: Option<&Path>) -> Result<Vec<DirEntry>>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns the complete file contents as a [`Vec<u8>`].
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Write file contents.
    ///
    /// Creates a new file or overwrites an existing file with the provided
    /// data.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    /// - If the destination already exists, it will be overwritten. Combined
    ///   with [`write`](Self::write) to a scratch path this gives atomic
    ///   replacement on backends that support it.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Absolute filesystem location for a stored path, for handing to
    /// external tools (ffprobe, ffmpeg).
    ///
    /// Backends without real filesystem locations return a placeholder
    /// rooted at their name; callers that shell out against such a backend
    /// get a clean process failure instead of a panic.
    fn absolute(&self, path: &Path) -> Result<PathBuf>;
}
