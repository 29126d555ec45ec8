//! In-memory storage backend for testing.

use crate::error::{ErrorKind, Result};
use crate::file::{DirEntry, FileInfo};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

/// In-memory storage backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Ideal for unit
/// tests that need a [`StorageBackend`] without filesystem dependencies.
/// Directories exist implicitly: any path component above a stored file
/// shows up in [`read_dir`](StorageBackend::read_dir) listings.
///
/// # Examples
///
/// ```
/// use glimpse_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("albums/beach.jpg", b"\xff\xd8..."),
/// ]);
/// assert!(backend.exists(Path::new("albums/beach.jpg")).await?);
///
/// backend.write(Path::new("albums/dunes.jpg"), b"data...").await?;
/// assert!(backend.exists(Path::new("albums/dunes.jpg")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then the test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
        }
    }

    /// Change the name of the mock backend.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Insert a file with an explicit modification timestamp.
    ///
    /// Refresh-detection tests need to control what `stat` reports, which
    /// plain [`write`](StorageBackend::write) (always "now") cannot do.
    pub async fn write_timestamped(&self, path: &Path, data: &[u8], modified: OffsetDateTime) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, (modified, data.to_vec()));
        Ok(())
    }

    fn file_info(path: &Path, size: u64, modified: OffsetDateTime) -> FileInfo {
        FileInfo::new(path, size, modified)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_dir(&self, dir: Option<&Path>) -> Result<Vec<DirEntry>> {
        let prefix = dir.map(validate_path).transpose()?;
        let guard = self.storage.read().await;
        // Collect the first path component below the prefix for every stored
        // file; deeper components mean the immediate child is a directory.
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        for path in guard.keys() {
            let below = match &prefix {
                Some(pfx) => match path.strip_prefix(pfx) {
                    Ok(below) => below,
                    Err(_) => continue,
                },
                None => path.as_path(),
            };
            let mut components = below.components();
            let Some(first) = components.next() else { continue };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let is_dir = components.next().is_some();
            // A name listed as both file and directory stays a directory.
            children.entry(name).and_modify(|d| *d |= is_dir).or_insert(is_dir);
        }
        if children.is_empty()
            && let Some(pfx) = prefix
        {
            exn::bail!(ErrorKind::NotFound(pfx));
        }
        Ok(children.into_iter().map(|(name, is_dir)| DirEntry { name, is_dir }).collect())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_modified, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.storage.write().await;
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        let (modified, data) = guard.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(Self::file_info(&path, data.len() as u64, *modified))
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        let validated = validate_path(path)?;
        Ok(Path::new("/").join(&self.name).join(validated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let backend = MockBackend::default();
        backend.write(Path::new("test.txt"), b"hello").await.unwrap();
        let data = backend.read(Path::new("test.txt")).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_with_files() {
        let backend = MockBackend::with_files([
            ("a/beach.jpg", Vec::from(*b"pic")),
            ("b/clip.mp4", Vec::from(*b"vid")),
        ]);
        assert!(backend.exists(Path::new("a/beach.jpg")).await.unwrap());
        assert!(backend.exists(Path::new("b/clip.mp4")).await.unwrap());
        assert!(!backend.exists(Path::new("c/nope")).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let backend = MockBackend::default();
        let err = backend.read(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_dir_roots_and_subdirs() {
        let backend = MockBackend::with_files([
            ("a/one.jpg", Vec::from(*b"1")),
            ("a/b/two.mp4", Vec::from(*b"2")),
            ("top.txt", Vec::from(*b"3")),
        ]);

        let root = backend.read_dir(None).await.unwrap();
        assert_eq!(root, vec![
            DirEntry { name: "a".into(), is_dir: true },
            DirEntry { name: "top.txt".into(), is_dir: false },
        ]);

        let sub = backend.read_dir(Some(Path::new("a"))).await.unwrap();
        assert_eq!(sub, vec![
            DirEntry { name: "b".into(), is_dir: true },
            DirEntry { name: "one.jpg".into(), is_dir: false },
        ]);
    }

    #[tokio::test]
    async fn test_read_dir_missing_is_not_found() {
        let backend = MockBackend::with_files([("a/one.jpg", Vec::from(*b"1"))]);
        let err = backend.read_dir(Some(Path::new("zzz"))).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename() {
        let backend = MockBackend::default();
        backend.write(Path::new("old.txt"), b"data").await.unwrap();
        backend.rename(Path::new("old.txt"), Path::new("new.txt")).await.unwrap();
        assert!(!backend.exists(Path::new("old.txt")).await.unwrap());
        assert_eq!(backend.read(Path::new("new.txt")).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_rename_not_found() {
        let backend = MockBackend::default();
        let err = backend.rename(Path::new("missing.txt"), Path::new("new.txt")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat_reports_explicit_timestamp() {
        let backend = MockBackend::default();
        let modified = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        backend.write_timestamped(Path::new("clip.mp4"), b"12345", modified).await.unwrap();
        let info = backend.stat(Path::new("clip.mp4")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("clip.mp4"));
        assert_eq!(info.size, 5);
        assert_eq!(info.modified, modified);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let backend = MockBackend::default();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../escape"), b"bad").await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockBackend::with_files([("../escape", Vec::from(*b"bad"))]);
    }
}
