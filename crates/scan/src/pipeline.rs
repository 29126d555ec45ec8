//! Staged enrichment between an item source and the tree.
//!
//! Items flow through two worker-pool stages before landing in the index: a
//! probe stage that fills dimensions (and video duration), and an enrich
//! stage that attaches cached tags and captions. A final pool of mutators
//! folds items into the shared tree under one scan generation, and whatever
//! the stream never touched is swept once it ends. Channels between stages
//! are bounded, so one slow probe cannot pull the whole library into memory.

use async_channel::Receiver;
use glimpse_cache::{CacheStore, VideoMeta};
use glimpse_index::{DirectoryNode, ItemKind, ScanId, ScanItem};
use glimpse_poster::{PosterQueue, poster_exists};
use glimpse_probe::{MediaProber, ProberHandle};
use glimpse_storage::{BackendHandle, StorageBackend};
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

const PROBE_WORKERS: usize = 4;
const ENRICH_WORKERS: usize = 4;
const MUTATE_WORKERS: usize = 4;
const STAGE_BUFFER: usize = 100;

/// Everything a pipeline stage may need, one `Arc` per scan.
pub(crate) struct PipelineCtx {
    pub(crate) origin: BackendHandle,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) prober: ProberHandle,
    pub(crate) posters: Option<Arc<PosterQueue>>,
}

impl PipelineCtx {
    /// Hand a video to the poster queue. `stale` skips the existence check:
    /// changed content invalidates whatever poster is there.
    async fn enqueue_poster(&self, path: &str, stale: bool) {
        let Some(queue) = &self.posters else {
            return;
        };
        if stale || !poster_exists(&self.origin, self.cache.backend(), Path::new(path)).await {
            queue.enqueue(path);
        }
    }
}

/// Drive a full item stream into the tree and sweep what it never touched.
pub(crate) async fn run(ctx: Arc<PipelineCtx>, root: &Arc<DirectoryNode>, source: Receiver<ScanItem>) {
    let scan = ScanId::now();
    let probed = probe_stage(Arc::clone(&ctx), source);
    let enriched = enrich_stage(ctx, probed);
    let mutators: Vec<_> = (0..MUTATE_WORKERS)
        .map(|_| {
            let root = Arc::clone(root);
            let input = enriched.clone();
            tokio::spawn(async move {
                while let Ok(item) = input.recv().await {
                    root.apply(&item, scan);
                }
            })
        })
        .collect();
    for mutator in mutators {
        let _ = mutator.await;
    }
    let removed = root.sweep(scan);
    if removed > 0 {
        tracing::info!(removed, "Cleaned up deleted entries");
    }
}

fn probe_stage(ctx: Arc<PipelineCtx>, input: Receiver<ScanItem>) -> Receiver<ScanItem> {
    let (tx, rx) = async_channel::bounded(STAGE_BUFFER);
    for _ in 0..PROBE_WORKERS {
        let ctx = Arc::clone(&ctx);
        let input = input.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(item) = input.recv().await {
                if let Some(item) = probe_item(&ctx, item).await
                    && tx.send(item).await.is_err()
                {
                    break;
                }
            }
        });
    }
    rx
}

/// Fill in dimensions for media items, dropping what cannot be measured.
///
/// Items that already carry dimensions pass straight through; that is what
/// lets snapshot replay run without touching the origin backend.
async fn probe_item(ctx: &PipelineCtx, item: ScanItem) -> Option<ScanItem> {
    match item.kind {
        ItemKind::Image => probe_image(ctx, item).await,
        ItemKind::Video => probe_video(ctx, item).await,
        ItemKind::Directory | ItemKind::File => Some(item),
    }
}

async fn probe_image(ctx: &PipelineCtx, mut item: ScanItem) -> Option<ScanItem> {
    if item.has_dimensions() {
        return Some(item);
    }
    if let Some(size) = ctx.cache.size_of(&item.path) {
        item.width = size.width;
        item.height = size.height;
        return Some(item);
    }
    match image_dimensions(&ctx.origin, &item.path).await {
        Some((width, height)) => {
            item.width = width;
            item.height = height;
            Some(item)
        }
        None => {
            tracing::debug!(path = %item.path, "Image dimensions unreadable, dropping");
            None
        }
    }
}

async fn image_dimensions(origin: &BackendHandle, path: &str) -> Option<(u32, u32)> {
    let bytes = origin.read(Path::new(path)).await.ok()?;
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format().ok()?;
    reader.into_dimensions().ok()
}

async fn probe_video(ctx: &PipelineCtx, mut item: ScanItem) -> Option<ScanItem> {
    if item.has_dimensions() {
        return Some(item);
    }
    let location = Path::new(&item.path);
    let info = match ctx.origin.stat(location).await {
        Ok(info) => info,
        Err(error) => {
            tracing::debug!(path = %item.path, error = %error, "Video stat failed, dropping");
            return None;
        }
    };
    let stale = ctx.cache.needs_video_meta_refresh(&item.path, info.modified_unix_nanos(), info.size);
    if !stale
        && let Some(meta) = ctx.cache.video_meta(&item.path)
        && meta.width > 0
        && meta.height > 0
    {
        item.width = meta.width;
        item.height = meta.height;
        item.duration_sec = meta.duration_sec;
        ctx.enqueue_poster(&item.path, false).await;
        return Some(item);
    }
    let absolute = match ctx.origin.absolute(location) {
        Ok(absolute) => absolute,
        Err(error) => {
            tracing::warn!(path = %item.path, error = %error, "No absolute location to probe, dropping");
            return None;
        }
    };
    let probe = match ctx.prober.probe(&absolute).await {
        Ok(probe) => probe,
        Err(error) => {
            tracing::warn!(path = %item.path, error = %error, "ffprobe failed, dropping video");
            return None;
        }
    };
    item.width = probe.width;
    item.height = probe.height;
    item.duration_sec = probe.duration_sec;
    ctx.cache.upsert_video_meta(
        &item.path,
        VideoMeta {
            path: item.path.clone(),
            duration_sec: probe.duration_sec,
            width: probe.width,
            height: probe.height,
            size_bytes: info.size,
            mod_time_unix_nano: info.modified_unix_nanos(),
        },
    );
    ctx.enqueue_poster(&item.path, true).await;
    Some(item)
}

fn enrich_stage(ctx: Arc<PipelineCtx>, input: Receiver<ScanItem>) -> Receiver<ScanItem> {
    let (tx, rx) = async_channel::bounded(STAGE_BUFFER);
    for _ in 0..ENRICH_WORKERS {
        let ctx = Arc::clone(&ctx);
        let input = input.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Ok(item) = input.recv().await {
                if tx.send(enrich_item(&ctx.cache, item)).await.is_err() {
                    break;
                }
            }
        });
    }
    rx
}

/// Attach cached tags and captions to media items that arrived without them.
fn enrich_item(cache: &CacheStore, mut item: ScanItem) -> ScanItem {
    if !matches!(item.kind, ItemKind::Image | ItemKind::Video) {
        return item;
    }
    if item.tags.is_empty() {
        item.tags = cache.tags_of(&item.path);
    }
    if item.caption.is_empty() {
        item.caption = cache.caption_of(&item.path);
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FailingProber, RecordingGenerator, ScriptedProber, drain, gif_bytes};
    use glimpse_cache::{CAPTION_FILE, SIZE_FILE, TAG_FILE};
    use glimpse_index::TagInfo;
    use glimpse_poster::{PosterGenerator, PosterQueueOptions};
    use glimpse_storage::backend::MockBackend;
    use time::OffsetDateTime;

    fn ctx_with(
        origin: Arc<MockBackend>,
        cache: Arc<CacheStore>,
        prober: ProberHandle,
    ) -> PipelineCtx {
        PipelineCtx { origin, cache, prober, posters: None }
    }

    fn empty_cache() -> Arc<CacheStore> {
        let backend: BackendHandle = Arc::new(MockBackend::default().with_name("cache"));
        Arc::new(CacheStore::new(backend, Vec::new()))
    }

    #[tokio::test]
    async fn test_image_dimensions_from_header() {
        let origin: BackendHandle =
            Arc::new(MockBackend::with_files([("beach.gif", gif_bytes(200, 100))]));
        assert_eq!(image_dimensions(&origin, "beach.gif").await, Some((200, 100)));
    }

    #[tokio::test]
    async fn test_image_dimensions_rejects_garbage() {
        let origin: BackendHandle =
            Arc::new(MockBackend::with_files([("beach.jpg", Vec::from(*b"not an image"))]));
        assert_eq!(image_dimensions(&origin, "beach.jpg").await, None);
    }

    #[tokio::test]
    async fn test_replayed_items_pass_through_untouched() {
        // Empty origin: any storage access would drop the item instead.
        let ctx = ctx_with(
            Arc::new(MockBackend::default()),
            empty_cache(),
            Arc::new(FailingProber::default()),
        );
        let mut image = ScanItem::image("a/beach.jpg", "beach.jpg");
        image.width = 200;
        image.height = 100;
        let mut video = ScanItem::video("a/clip.mp4", "clip.mp4");
        video.width = 1920;
        video.height = 1080;
        video.duration_sec = 12.0;

        assert_eq!(probe_item(&ctx, image.clone()).await, Some(image));
        assert_eq!(probe_item(&ctx, video.clone()).await, Some(video));
    }

    #[tokio::test]
    async fn test_probe_image_prefers_cached_size() {
        // The stored bytes are garbage, so only the cached size can answer.
        let origin = Arc::new(MockBackend::with_files([("a/beach.jpg", Vec::from(*b"junk"))]));
        let cache_backend: BackendHandle = Arc::new(MockBackend::with_files([(
            SIZE_FILE,
            Vec::from(*br#"{"a/beach.jpg":{"width":640,"height":480}}"#),
        )]));
        let cache = Arc::new(CacheStore::new(cache_backend, Vec::new()));
        cache.load().await.unwrap();
        let ctx = ctx_with(origin, cache, Arc::new(FailingProber::default()));

        let item = probe_item(&ctx, ScanItem::image("a/beach.jpg", "beach.jpg")).await.unwrap();
        assert_eq!((item.width, item.height), (640, 480));
    }

    #[tokio::test]
    async fn test_probe_image_decodes_header_as_last_resort() {
        let origin = Arc::new(MockBackend::with_files([("a/beach.jpg", gif_bytes(320, 240))]));
        let ctx = ctx_with(origin, empty_cache(), Arc::new(FailingProber::default()));

        let item = probe_item(&ctx, ScanItem::image("a/beach.jpg", "beach.jpg")).await.unwrap();
        assert_eq!((item.width, item.height), (320, 240));
    }

    #[tokio::test]
    async fn test_probe_image_drops_undecodable() {
        let origin = Arc::new(MockBackend::with_files([("a/beach.jpg", Vec::from(*b"junk"))]));
        let ctx = ctx_with(origin, empty_cache(), Arc::new(FailingProber::default()));

        assert_eq!(probe_item(&ctx, ScanItem::image("a/beach.jpg", "beach.jpg")).await, None);
    }

    #[tokio::test]
    async fn test_probe_video_uses_fresh_cached_meta() {
        let origin = Arc::new(MockBackend::default());
        let modified = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        origin.write_timestamped(Path::new("a/clip.mp4"), b"12345", modified).await.unwrap();
        let cache = empty_cache();
        cache.upsert_video_meta("a/clip.mp4", VideoMeta {
            path: "a/clip.mp4".to_owned(),
            duration_sec: 12.0,
            width: 1920,
            height: 1080,
            size_bytes: 5,
            mod_time_unix_nano: 1_700_000_000_000_000_000,
        });
        let prober = Arc::new(ScriptedProber::new(640, 360, 99.0));
        let ctx = ctx_with(origin, cache, Arc::clone(&prober) as ProberHandle);

        let item = probe_item(&ctx, ScanItem::video("a/clip.mp4", "clip.mp4")).await.unwrap();
        assert_eq!((item.width, item.height), (1920, 1080));
        assert_eq!(item.duration_sec, 12.0);
        assert_eq!(prober.call_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_video_probes_and_upserts_when_stale() {
        let origin = Arc::new(MockBackend::default());
        let modified = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        origin.write_timestamped(Path::new("a/clip.mp4"), b"123456", modified).await.unwrap();
        let cache = empty_cache();
        // Same path, older stat: the entry no longer matches the file.
        cache.upsert_video_meta("a/clip.mp4", VideoMeta {
            path: "a/clip.mp4".to_owned(),
            duration_sec: 5.0,
            width: 640,
            height: 360,
            size_bytes: 5,
            mod_time_unix_nano: 1,
        });
        let prober = Arc::new(ScriptedProber::new(1920, 1080, 12.0));
        let ctx = ctx_with(origin, Arc::clone(&cache), Arc::clone(&prober) as ProberHandle);

        let item = probe_item(&ctx, ScanItem::video("a/clip.mp4", "clip.mp4")).await.unwrap();
        assert_eq!((item.width, item.height), (1920, 1080));
        assert_eq!(item.duration_sec, 12.0);
        assert_eq!(prober.call_count(), 1);

        let meta = cache.video_meta("a/clip.mp4").unwrap();
        assert_eq!(meta.size_bytes, 6);
        assert_eq!(meta.mod_time_unix_nano, 1_700_000_000_000_000_000);
        assert_eq!((meta.width, meta.height), (1920, 1080));
    }

    #[tokio::test]
    async fn test_probe_video_drops_on_probe_failure() {
        let origin = Arc::new(MockBackend::with_files([("a/clip.mp4", Vec::from(*b"vid"))]));
        let prober = Arc::new(FailingProber::default());
        let ctx = ctx_with(origin, empty_cache(), Arc::clone(&prober) as ProberHandle);

        assert_eq!(probe_item(&ctx, ScanItem::video("a/clip.mp4", "clip.mp4")).await, None);
        assert_eq!(prober.call_count(), 1);
    }

    #[tokio::test]
    async fn test_probe_video_drops_when_stat_fails() {
        let prober = Arc::new(ScriptedProber::new(1920, 1080, 12.0));
        let ctx = ctx_with(
            Arc::new(MockBackend::default()),
            empty_cache(),
            Arc::clone(&prober) as ProberHandle,
        );

        assert_eq!(probe_item(&ctx, ScanItem::video("gone.mp4", "gone.mp4")).await, None);
        assert_eq!(prober.call_count(), 0);
    }

    #[tokio::test]
    async fn test_directories_and_plain_files_pass_through() {
        let ctx = ctx_with(
            Arc::new(MockBackend::default()),
            empty_cache(),
            Arc::new(FailingProber::default()),
        );
        let dir = ScanItem::directory("a", "a");
        let file = ScanItem::file("a/notes.txt", "notes.txt");

        assert_eq!(probe_item(&ctx, dir.clone()).await, Some(dir));
        assert_eq!(probe_item(&ctx, file.clone()).await, Some(file));
    }

    #[tokio::test]
    async fn test_enrich_attaches_cached_tags_and_caption() {
        let cache_backend: BackendHandle = Arc::new(MockBackend::with_files([
            (TAG_FILE, Vec::from(*br#"{"a/beach.jpg":[{"tag":"beach","value":90}]}"#)),
            (CAPTION_FILE, Vec::from(*br#"{"a/beach.jpg":"sunset over the bay"}"#)),
        ]));
        let cache = CacheStore::new(cache_backend, Vec::new());
        cache.load().await.unwrap();

        let item = enrich_item(&cache, ScanItem::image("a/beach.jpg", "beach.jpg"));
        assert_eq!(item.tags, vec![TagInfo::new("beach", 90)]);
        assert_eq!(item.caption, "sunset over the bay");

        // Unknown path stays empty.
        let other = enrich_item(&cache, ScanItem::image("a/other.jpg", "other.jpg"));
        assert!(other.tags.is_empty());
        assert!(other.caption.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_keeps_values_already_present() {
        let cache_backend: BackendHandle = Arc::new(MockBackend::with_files([
            (TAG_FILE, Vec::from(*br#"{"a/clip.mp4":[{"tag":"old","value":10}]}"#)),
            (CAPTION_FILE, Vec::from(*br#"{"a/clip.mp4":"old caption"}"#)),
        ]));
        let cache = CacheStore::new(cache_backend, Vec::new());
        cache.load().await.unwrap();

        let mut replayed = ScanItem::video("a/clip.mp4", "clip.mp4");
        replayed.tags = vec![TagInfo::new("fresh", 80)];
        replayed.caption = "fresh caption".to_owned();

        let item = enrich_item(&cache, replayed.clone());
        assert_eq!(item, replayed);
    }

    #[tokio::test]
    async fn test_stale_video_enqueues_poster_even_when_one_exists() {
        let origin = Arc::new(MockBackend::with_files([("a/clip.mp4", Vec::from(*b"vid"))]));
        let cache_backend = Arc::new(
            MockBackend::with_files([("a/clip.mp4.poster.jpg", Vec::from(*b"jpg"))])
                .with_name("cache"),
        );
        let cache = Arc::new(CacheStore::new(Arc::clone(&cache_backend) as BackendHandle, Vec::new()));
        let generator = Arc::new(RecordingGenerator::default());
        let queue = Arc::new(PosterQueue::new(
            Arc::clone(&generator) as Arc<dyn PosterGenerator>,
            PosterQueueOptions::default(),
        ));
        let ctx = PipelineCtx {
            origin,
            cache,
            prober: Arc::new(ScriptedProber::new(1920, 1080, 12.0)),
            posters: Some(Arc::clone(&queue)),
        };

        probe_item(&ctx, ScanItem::video("a/clip.mp4", "clip.mp4")).await.unwrap();
        drain(&queue).await;
        assert_eq!(generator.seen(), vec![std::path::PathBuf::from("a/clip.mp4")]);
    }

    #[tokio::test]
    async fn test_fresh_video_with_poster_is_not_enqueued() {
        let origin = Arc::new(MockBackend::default());
        let modified = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        origin.write_timestamped(Path::new("a/clip.mp4"), b"12345", modified).await.unwrap();
        let cache_backend = Arc::new(
            MockBackend::with_files([("a/clip.mp4.poster.jpg", Vec::from(*b"jpg"))])
                .with_name("cache"),
        );
        let cache = Arc::new(CacheStore::new(Arc::clone(&cache_backend) as BackendHandle, Vec::new()));
        cache.upsert_video_meta("a/clip.mp4", VideoMeta {
            path: "a/clip.mp4".to_owned(),
            duration_sec: 12.0,
            width: 1920,
            height: 1080,
            size_bytes: 5,
            mod_time_unix_nano: 1_700_000_000_000_000_000,
        });
        let generator = Arc::new(RecordingGenerator::default());
        let queue = Arc::new(PosterQueue::new(
            Arc::clone(&generator) as Arc<dyn PosterGenerator>,
            PosterQueueOptions::default(),
        ));
        let ctx = PipelineCtx {
            origin,
            cache,
            prober: Arc::new(FailingProber::default()),
            posters: Some(Arc::clone(&queue)),
        };

        probe_item(&ctx, ScanItem::video("a/clip.mp4", "clip.mp4")).await.unwrap();
        drain(&queue).await;
        assert!(generator.seen().is_empty());
    }
}
