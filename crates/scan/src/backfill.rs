//! On-demand video metadata resolution for display paths.
//!
//! Listings prefer what the tree already knows, but an entry scanned before
//! its probe succeeded (or pulled from an old snapshot) can reach the UI
//! without dimensions. The backfill resolves those synchronously through the
//! same stat-compare-probe ladder the pipeline uses, and feeds what it
//! learns back into the cache so the next save persists it.

use async_trait::async_trait;
use glimpse_cache::{CacheStore, VideoMeta};
use glimpse_index::{ImageEntry, VideoEntry};
use glimpse_poster::DurationSource;
use glimpse_probe::{MediaProber, ProberHandle};
use glimpse_storage::{BackendHandle, StorageBackend, media};
use std::path::Path;
use std::sync::Arc;

pub struct MetaBackfill {
    origin: BackendHandle,
    cache: Arc<CacheStore>,
    prober: ProberHandle,
}

impl MetaBackfill {
    pub fn new(origin: BackendHandle, cache: Arc<CacheStore>, prober: ProberHandle) -> Self {
        Self { origin, cache, prober }
    }

    /// Resolve complete metadata for one video, probing if the cache cannot
    /// answer. `None` means the file is unreadable or unprobeable; failures
    /// are logged here so callers can just skip the entry.
    pub async fn video_meta(&self, path: &str) -> Option<VideoMeta> {
        let location = Path::new(path);
        let info = match self.origin.stat(location).await {
            Ok(info) => info,
            Err(error) => {
                tracing::warn!(path, error = %error, "Video stat failed");
                return None;
            }
        };
        if !self.cache.needs_video_meta_refresh(path, info.modified_unix_nanos(), info.size)
            && let Some(meta) = self.cache.video_meta(path)
            && meta.width > 0
            && meta.height > 0
            && meta.duration_sec > 0.0
        {
            return Some(meta);
        }
        let absolute = self.origin.absolute(location).ok()?;
        let probe = match self.prober.probe(&absolute).await {
            Ok(probe) => probe,
            Err(error) => {
                tracing::warn!(path, error = %error, "ffprobe failed");
                return None;
            }
        };
        let meta = VideoMeta {
            path: path.to_owned(),
            duration_sec: probe.duration_sec,
            width: probe.width,
            height: probe.height,
            size_bytes: info.size,
            mod_time_unix_nano: info.modified_unix_nanos(),
        };
        self.cache.upsert_video_meta(path, meta.clone());
        Some(meta)
    }

    /// Complete a listing's video entries, dropping the ones that cannot be
    /// resolved.
    pub async fn fill_videos(&self, videos: Vec<VideoEntry>) -> Vec<VideoEntry> {
        let mut filled = Vec::with_capacity(videos.len());
        for mut video in videos {
            if !video.size.is_empty() && video.duration_sec > 0.0 {
                filled.push(video);
                continue;
            }
            match self.video_meta(&video.path).await {
                Some(meta) => {
                    video.size.width = meta.width;
                    video.size.height = meta.height;
                    video.duration_sec = meta.duration_sec;
                    filled.push(video);
                }
                None => {
                    tracing::debug!(path = %video.path, "Dropping video entry without metadata");
                }
            }
        }
        filled
    }

    /// Fill dimensions on a video-shaped cover descriptor. An unresolvable
    /// cover keeps whatever it had.
    pub async fn fill_cover(&self, cover: &mut ImageEntry) {
        if !cover.size.is_empty() || !media::is_video(&cover.path) {
            return;
        }
        if let Some(meta) = self.video_meta(&cover.path).await {
            cover.size.width = meta.width;
            cover.size.height = meta.height;
        }
    }
}

/// Duration source backed by the cache, for the poster generator's seek
/// fallback. Only answers when the cached entry is still fresh for the
/// file's current stat; anything else means "probe it yourself".
pub struct CachedDurations {
    origin: BackendHandle,
    cache: Arc<CacheStore>,
}

impl CachedDurations {
    pub fn new(origin: BackendHandle, cache: Arc<CacheStore>) -> Self {
        Self { origin, cache }
    }
}

#[async_trait]
impl DurationSource for CachedDurations {
    async fn duration_of(&self, source: &Path) -> Option<f64> {
        let path = source.to_str()?;
        let info = self.origin.stat(source).await.ok()?;
        if self.cache.needs_video_meta_refresh(path, info.modified_unix_nanos(), info.size) {
            return None;
        }
        let meta = self.cache.video_meta(path)?;
        (meta.duration_sec > 0.0).then_some(meta.duration_sec)
    }
}
