//! Scan orchestration: walk or replay, pipe, merge, persist.

use crate::discover;
use crate::error::{ErrorKind, Result};
use crate::pipeline::{self, PipelineCtx};
use exn::ResultExt;
use glimpse_cache::CacheStore;
use glimpse_index::DirectoryNode;
use glimpse_poster::PosterQueue;
use glimpse_probe::ProberHandle;
use glimpse_storage::BackendHandle;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Runs scans against one origin backend and folds the results into a
/// shared media tree.
///
/// The scanner does not own the tree; callers pass the root in so request
/// handlers can keep serving from it while a scan rewrites it in place.
pub struct Scanner {
    origin: BackendHandle,
    cache: Arc<CacheStore>,
    prober: ProberHandle,
    posters: Option<Arc<PosterQueue>>,
    exclude: Arc<HashSet<String>>,
    virtual_paths: BTreeMap<String, Vec<String>>,
}

impl Scanner {
    pub fn new(origin: BackendHandle, cache: Arc<CacheStore>, prober: ProberHandle) -> Self {
        Self {
            origin,
            cache,
            prober,
            posters: None,
            exclude: Arc::new(HashSet::new()),
            virtual_paths: BTreeMap::new(),
        }
    }

    /// Relative paths (single files or whole subtrees) the walk must skip.
    pub fn with_exclude(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.exclude = Arc::new(paths.into_iter().collect());
        self
    }

    /// Synthetic albums, each merged over its listed source directories
    /// after every scan and restore.
    pub fn with_virtual_paths(
        mut self,
        paths: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Self {
        self.virtual_paths = paths.into_iter().collect();
        self
    }

    /// Queue that receives poster-less or re-probed videos during scans.
    pub fn with_poster_queue(mut self, queue: Arc<PosterQueue>) -> Self {
        self.posters = Some(queue);
        self
    }

    fn pipeline_ctx(&self) -> Arc<PipelineCtx> {
        Arc::new(PipelineCtx {
            origin: Arc::clone(&self.origin),
            cache: Arc::clone(&self.cache),
            prober: Arc::clone(&self.prober),
            posters: self.posters.clone(),
        })
    }

    /// Walk the origin backend and bring `root` up to date with it.
    ///
    /// Runs mark-and-sweep under a fresh scan generation, re-applies the
    /// configured virtual albums and persists the result. Per-file failures
    /// are logged and skipped; the scan itself always completes.
    pub async fn scan(&self, root: &Arc<DirectoryNode>) {
        let started = Instant::now();
        tracing::info!("Scan started");
        let source = discover::start_discovery(Arc::clone(&self.origin), Arc::clone(&self.exclude));
        pipeline::run(self.pipeline_ctx(), root, source).await;
        self.apply_virtual_paths(root);
        if let Err(error) = self.persist(root).await {
            tracing::warn!(error = %error, "Cache save failed");
        }
        tracing::info!(elapsed = ?started.elapsed(), "Scan finished");
    }

    /// Rebuild `root` from the persisted snapshot without touching the
    /// origin backend.
    ///
    /// Returns the number of replayed items; zero means there was no usable
    /// snapshot and the tree is untouched. Nothing is persisted back, the
    /// follow-up scan will do that.
    pub async fn restore(&self, root: &Arc<DirectoryNode>) -> Result<usize> {
        let Some(items) = self.cache.load().await.or_raise(|| ErrorKind::Cache)? else {
            return Ok(0);
        };
        if items.is_empty() {
            return Ok(0);
        }
        let count = items.len();
        let source = discover::replay(items);
        pipeline::run(self.pipeline_ctx(), root, source).await;
        self.apply_virtual_paths(root);
        Ok(count)
    }

    /// Persist the tree to the cache backend.
    pub async fn persist(&self, root: &DirectoryNode) -> Result<()> {
        self.cache.save(root).await.or_raise(|| ErrorKind::Cache)
    }

    fn apply_virtual_paths(&self, root: &Arc<DirectoryNode>) {
        for (name, sources) in &self.virtual_paths {
            let nodes: Vec<Arc<DirectoryNode>> =
                sources.iter().map(|path| root.locate(path)).collect();
            root.adopt(DirectoryNode::merge(name, &nodes));
        }
    }
}
