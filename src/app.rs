//! Wiring of the indexing stack for one CLI invocation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use exn::ResultExt;
use glimpse_cache::CacheStore;
use glimpse_config::Config;
use glimpse_index::DirectoryNode;
use glimpse_poster::{Ffmpeg, FfmpegPosterGenerator, PosterQueue, PosterQueueOptions};
use glimpse_probe::{Ffprobe, ProberHandle};
use glimpse_scan::{CachedDurations, ScanScheduler, Scanner};
use glimpse_storage::BackendHandle;
use glimpse_storage::backend::LocalBackend;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorKind, Result};

/// The assembled indexing stack: origin and cache backends, the shared tree,
/// and the scanner bound to both.
pub struct App {
    pub root: Arc<DirectoryNode>,
    pub scanner: Arc<Scanner>,
    pub cache: Arc<CacheStore>,
    posters: Option<Arc<PosterQueue>>,
}

impl App {
    /// Build every component from the configuration.
    ///
    /// ffprobe is mandatory when scanning; without it every video in the
    /// library would be dropped. ffmpeg is best-effort: if it cannot be
    /// found, posters are skipped and everything else proceeds.
    pub fn assemble(config: &Config, with_posters: bool) -> Result<Self> {
        let origin = local_backend("media", &config.resource.base)?;
        let cache_backend = local_backend("cache", &config.cache)?;
        let cache = Arc::new(CacheStore::new(
            Arc::clone(&cache_backend),
            config.resource.tag_blacklist.iter().cloned(),
        ));

        let prober: ProberHandle = match &config.tools.ffprobe {
            Some(binary) => Arc::new(Ffprobe::at(binary)),
            None => Arc::new(Ffprobe::discover().or_raise(|| ErrorKind::Probe)?),
        };

        let posters = if with_posters {
            poster_queue(config, &origin, &cache_backend, &cache, &prober)
        } else {
            None
        };

        let mut scanner = Scanner::new(Arc::clone(&origin), Arc::clone(&cache), Arc::clone(&prober))
            .with_exclude(config.resource.exclude.iter().cloned())
            .with_virtual_paths(config.resource.virtual_paths.clone());
        if let Some(queue) = &posters {
            scanner = scanner.with_poster_queue(Arc::clone(queue));
        }

        Ok(Self { root: DirectoryNode::new_root(), scanner: Arc::new(scanner), cache, posters })
    }

    /// Populate the tree, preferring the cached snapshot over a live scan.
    pub async fn ensure_tree(&self) {
        match self.scanner.restore(&self.root).await {
            Ok(count) if count > 0 => {
                tracing::debug!(restored = count, "Serving from cached snapshot");
                return;
            }
            Ok(_) => tracing::info!("Cache is cold; scanning the library"),
            Err(err) => tracing::warn!(error = %err, "Cache restore failed; scanning the library"),
        }
        self.scanner.scan(&self.root).await;
    }

    /// One full scan, waiting for the poster backlog to drain before
    /// returning.
    pub async fn run_scan(&self) {
        let cancel = CancellationToken::new();
        let workers = match &self.posters {
            Some(queue) => queue.run(cancel.clone()),
            None => Vec::new(),
        };

        self.scanner.scan(&self.root).await;

        if let Some(queue) = &self.posters {
            queue.close();
        }
        for worker in workers {
            let _ = worker.await;
        }
    }

    /// Warm up from the cache, then keep the tree fresh until interrupted.
    ///
    /// A ticker requests a rescan once per freshness window; the scheduler
    /// ignores requests that arrive while the tree is still fresh, so the
    /// effective cadence is "at most one scan per window".
    pub async fn run_watch(&self, window: Duration) -> Result<()> {
        let scheduler = Arc::new(ScanScheduler::new(
            Arc::clone(&self.scanner),
            Arc::clone(&self.root),
            window,
        ));
        let cancel = CancellationToken::new();
        let mut tasks = match &self.posters {
            Some(queue) => queue.run(cancel.clone()),
            None => Vec::new(),
        };

        scheduler.warm_up().await;
        tasks.push(tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        }));
        tasks.push(tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            let cancel = cancel.clone();
            async move {
                let mut ticks = tokio::time::interval(window);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticks.tick() => scheduler.trigger(),
                    }
                }
            }
        }));

        tokio::signal::ctrl_c().await.or_raise(|| ErrorKind::Signal)?;
        tracing::info!("Shutdown requested");

        cancel.cancel();
        if let Some(queue) = &self.posters {
            queue.close();
        }
        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }
}

fn local_backend(name: &str, root: &Path) -> Result<BackendHandle> {
    let root = std::path::absolute(root).or_raise(|| ErrorKind::Storage)?;
    let backend = LocalBackend::new(name, root).or_raise(|| ErrorKind::Storage)?;
    Ok(Arc::new(backend))
}

fn poster_queue(
    config: &Config,
    origin: &BackendHandle,
    cache_backend: &BackendHandle,
    cache: &Arc<CacheStore>,
    prober: &ProberHandle,
) -> Option<Arc<PosterQueue>> {
    let extractor = match &config.tools.ffmpeg {
        Some(binary) => Ffmpeg::at(binary),
        None => match Ffmpeg::discover() {
            Ok(ffmpeg) => ffmpeg,
            Err(err) => {
                tracing::warn!(error = %err, "ffmpeg not found; poster generation disabled");
                return None;
            }
        },
    };
    let durations = CachedDurations::new(Arc::clone(origin), Arc::clone(cache));
    let generator = FfmpegPosterGenerator::new(
        Arc::clone(origin),
        Arc::clone(cache_backend),
        Arc::new(durations),
        Arc::clone(prober),
        Arc::new(extractor),
    );
    let options = PosterQueueOptions {
        concurrency: config.poster.concurrency,
        dedup_ttl: config.poster.dedup_ttl(),
        capacity: config.poster.capacity,
    };
    Some(Arc::new(PosterQueue::new(Arc::new(generator), options)))
}
