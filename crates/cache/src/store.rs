//! The cache store: five JSON artifacts behind one diff-aware save.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use exn::ResultExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use glimpse_index::{DirectoryNode, ScanItem, Size, TagInfo};
use glimpse_storage::error::ErrorKind as StorageErrorKind;
use glimpse_storage::{BackendHandle, StorageBackend};

use crate::error::{ErrorKind, Result};
use crate::policy::TagPolicy;

/// Structural snapshot: the flattened tree as a list of scan items.
pub const SNAPSHOT_FILE: &str = "media.json";
/// Path → pixel dimensions.
pub const SIZE_FILE: &str = "media-size.json";
/// Path → raw tag list.
pub const TAG_FILE: &str = "media-tag.json";
/// Path → caption.
pub const CAPTION_FILE: &str = "media-caption.json";
/// Path → probed video metadata.
pub const VIDEO_META_FILE: &str = "video-meta.json";

/// Probed metadata for one video file.
///
/// `size_bytes` and `mod_time_unix_nano` record the stat of the file the
/// probe ran against; a mismatch on either means the entry is stale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    pub duration_sec: f64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub mod_time_unix_nano: i64,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Durable knowledge base for the scan pipeline.
///
/// Four knowledge maps (sizes, tags, captions, video metadata) plus the
/// structural snapshot, each its own JSON document on the cache backend.
/// The maps held here mirror what is on disk; [`save`](CacheStore::save)
/// rewrites a map's document only when the tree-derived value differs from
/// that baseline, so an unchanged library costs one snapshot write and
/// nothing else.
///
/// Video metadata additionally keeps a working copy that pipeline stages and
/// the on-demand backfill update as they probe; it is reconciled against the
/// baseline (and pruned to the tree's visible videos) at save time.
pub struct CacheStore {
    backend: BackendHandle,
    policy: TagPolicy,
    sizes: RwLock<HashMap<String, Size>>,
    tags: RwLock<HashMap<String, Vec<TagInfo>>>,
    captions: RwLock<HashMap<String, String>>,
    persisted_video_meta: RwLock<HashMap<String, VideoMeta>>,
    video_meta: RwLock<HashMap<String, VideoMeta>>,
}

impl CacheStore {
    pub fn new(backend: BackendHandle, tag_blacklist: impl IntoIterator<Item = String>) -> Self {
        Self {
            backend,
            policy: TagPolicy::new(tag_blacklist),
            sizes: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            captions: RwLock::new(HashMap::new()),
            persisted_video_meta: RwLock::new(HashMap::new()),
            video_meta: RwLock::new(HashMap::new()),
        }
    }

    pub fn tag_policy(&self) -> &TagPolicy {
        &self.policy
    }

    /// Backend holding the cache artifacts. Posters live on the same backend,
    /// next to the JSON documents, so the scan pipeline needs it to check for
    /// existing poster frames.
    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Load every artifact from the backend.
    ///
    /// The knowledge maps load first and degrade to empty on any failure, so
    /// a scan can still reuse whatever survived. The snapshot is different:
    /// absence is a normal cold start (`Ok(None)`), but a document that
    /// exists and does not decode is an error the caller must see.
    pub async fn load(&self) -> Result<Option<Vec<ScanItem>>> {
        *write_lock(&self.sizes) = self.load_map(SIZE_FILE).await;
        *write_lock(&self.tags) = self.load_map(TAG_FILE).await;
        *write_lock(&self.captions) = self.load_map(CAPTION_FILE).await;
        let persisted: HashMap<String, VideoMeta> = self.load_map(VIDEO_META_FILE).await;
        *write_lock(&self.video_meta) = persisted.clone();
        *write_lock(&self.persisted_video_meta) = persisted;

        info!(
            sizes = read_lock(&self.sizes).len(),
            tags = read_lock(&self.tags).len(),
            video_metas = read_lock(&self.video_meta).len(),
            "knowledge base loaded"
        );

        let snapshot = Path::new(SNAPSHOT_FILE);
        if !self.backend.exists(snapshot).await.or_raise(|| ErrorKind::Storage)? {
            return Ok(None);
        }
        let raw = self.backend.read(snapshot).await.or_raise(|| ErrorKind::Storage)?;
        let items: Vec<ScanItem> =
            serde_json::from_slice(&raw).or_raise(|| ErrorKind::CorruptSnapshot)?;
        info!(events = items.len(), "structure snapshot loaded");
        Ok(Some(items))
    }

    async fn load_map<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let raw = match self.backend.read(Path::new(name)).await {
            Ok(raw) => raw,
            Err(err) => {
                if !matches!(&*err, StorageErrorKind::NotFound(_)) {
                    warn!(artifact = name, error = %err, "cache artifact unreadable; starting empty");
                }
                return T::default();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(artifact = name, error = %err, "cache artifact corrupt; starting empty");
                T::default()
            }
        }
    }

    /// Persist the tree.
    ///
    /// The snapshot is always rewritten. Each knowledge map is re-derived
    /// from the tree, compared by full equality to the baseline, and written
    /// only on difference; a failed map write keeps the old baseline so the
    /// next save retries. Video metadata is pruned to the tree's current
    /// videos before the comparison.
    pub async fn save(&self, root: &DirectoryNode) -> Result<()> {
        let items = root.flatten();
        self.write_artifact(SNAPSHOT_FILE, &items).await?;

        let new_sizes = root.dump_sizes();
        if *read_lock(&self.sizes) != new_sizes {
            match self.write_artifact(SIZE_FILE, &new_sizes).await {
                Ok(()) => {
                    info!(entries = new_sizes.len(), "updated size cache");
                    *write_lock(&self.sizes) = new_sizes;
                }
                Err(err) => warn!(error = %err, "size cache write failed; keeping baseline"),
            }
        }

        let (new_tags, new_captions) = root.dump_meta();
        if *read_lock(&self.tags) != new_tags {
            match self.write_artifact(TAG_FILE, &new_tags).await {
                Ok(()) => {
                    info!(entries = new_tags.len(), "updated tag cache");
                    *write_lock(&self.tags) = new_tags;
                }
                Err(err) => warn!(error = %err, "tag cache write failed; keeping baseline"),
            }
        }
        if *read_lock(&self.captions) != new_captions {
            match self.write_artifact(CAPTION_FILE, &new_captions).await {
                Ok(()) => {
                    info!(entries = new_captions.len(), "updated caption cache");
                    *write_lock(&self.captions) = new_captions;
                }
                Err(err) => warn!(error = %err, "caption cache write failed; keeping baseline"),
            }
        }

        let visible: HashSet<String> =
            root.videos().into_iter().map(|video| video.path).filter(|p| !p.is_empty()).collect();
        let working = {
            let mut meta = write_lock(&self.video_meta);
            meta.retain(|path, _| visible.contains(path));
            meta.clone()
        };
        if *read_lock(&self.persisted_video_meta) != working {
            match self.write_artifact(VIDEO_META_FILE, &working).await {
                Ok(()) => {
                    info!(entries = working.len(), "updated video meta cache");
                    *write_lock(&self.persisted_video_meta) = working;
                }
                Err(err) => warn!(error = %err, "video meta cache write failed; keeping baseline"),
            }
        }

        Ok(())
    }

    async fn write_artifact<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec(value).or_raise(|| ErrorKind::Encode)?;
        self.backend.write(Path::new(name), &data).await.or_raise(|| ErrorKind::Storage)
    }

    /// Cached dimensions for a path, if the last persisted scan knew them.
    pub fn size_of(&self, path: &str) -> Option<Size> {
        read_lock(&self.sizes).get(path).copied()
    }

    /// Raw cached tags for a path; empty when unknown.
    pub fn tags_of(&self, path: &str) -> Vec<TagInfo> {
        read_lock(&self.tags).get(path).cloned().unwrap_or_default()
    }

    /// Cached caption for a path; empty when unknown.
    pub fn caption_of(&self, path: &str) -> String {
        read_lock(&self.captions).get(path).cloned().unwrap_or_default()
    }

    /// Current (working-copy) video metadata for a path.
    pub fn video_meta(&self, path: &str) -> Option<VideoMeta> {
        read_lock(&self.video_meta).get(path).cloned()
    }

    /// Record freshly probed video metadata in the working copy.
    pub fn upsert_video_meta(&self, path: &str, meta: VideoMeta) {
        write_lock(&self.video_meta).insert(path.to_owned(), meta);
    }

    /// Whether the cached video metadata is stale for a file with the given
    /// stat. Absence counts as stale.
    pub fn needs_video_meta_refresh(
        &self,
        path: &str,
        modified_unix_nanos: i64,
        size_bytes: u64,
    ) -> bool {
        match read_lock(&self.video_meta).get(path) {
            Some(meta) => {
                meta.mod_time_unix_nano != modified_unix_nanos || meta.size_bytes != size_bytes
            }
            None => true,
        }
    }
}
