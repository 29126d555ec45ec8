use crate::PosterGenerator;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tuning knobs for [`PosterQueue`]. Zeroed fields mean "use the default"
/// (one worker, 10 s dedup window, capacity 64).
#[derive(Debug, Clone, Copy)]
pub struct PosterQueueOptions {
    pub concurrency: usize,
    pub dedup_ttl: Duration,
    pub capacity: usize,
}

impl Default for PosterQueueOptions {
    fn default() -> Self {
        Self { concurrency: 1, dedup_ttl: Duration::from_secs(10), capacity: 64 }
    }
}

impl PosterQueueOptions {
    fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            concurrency: if self.concurrency == 0 { defaults.concurrency } else { self.concurrency },
            dedup_ttl: if self.dedup_ttl.is_zero() { defaults.dedup_ttl } else { self.dedup_ttl },
            capacity: if self.capacity == 0 { defaults.capacity } else { self.capacity },
        }
    }
}

/// Bounded background queue feeding poster generation.
///
/// The scan pipeline fires an enqueue for every video whose poster is
/// missing, and it fires the same paths again on every rescan. Two guards
/// keep that cheap: [`enqueue`](Self::enqueue) never blocks the caller, and a
/// short dedup window collapses repeats before they reach the generator.
pub struct PosterQueue {
    generator: Arc<dyn PosterGenerator>,
    tx: async_channel::Sender<PathBuf>,
    rx: async_channel::Receiver<PathBuf>,
    window: Arc<Mutex<DedupWindow>>,
    concurrency: usize,
}

impl PosterQueue {
    pub fn new(generator: Arc<dyn PosterGenerator>, options: PosterQueueOptions) -> Self {
        let options = options.normalized();
        let (tx, rx) = async_channel::bounded(options.capacity);
        Self {
            generator,
            tx,
            rx,
            window: Arc::new(Mutex::new(DedupWindow::new(options.dedup_ttl))),
            concurrency: options.concurrency,
        }
    }

    /// Queue a poster job without ever blocking the caller.
    ///
    /// A full queue hands the send off to a spawned task instead of waiting;
    /// a closed queue drops the job. Must be called from within a tokio
    /// runtime.
    pub fn enqueue(&self, source: impl Into<PathBuf>) {
        let source = source.into();
        if source.as_os_str().is_empty() {
            return;
        }
        match self.tx.try_send(source) {
            Ok(()) => {}
            Err(async_channel::TrySendError::Full(source)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(source).await;
                });
            }
            Err(async_channel::TrySendError::Closed(source)) => {
                tracing::trace!(source = %source.display(), "Poster queue closed; dropping job");
            }
        }
    }

    /// Spawn the worker pool. Workers run until the token fires or the
    /// queue is closed and drained; one job's failure never stops a worker.
    pub fn run(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.concurrency)
            .map(|worker| {
                let rx = self.rx.clone();
                let generator = Arc::clone(&self.generator);
                let window = Arc::clone(&self.window);
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let source = tokio::select! {
                            _ = cancel.cancelled() => break,
                            recv = rx.recv() => match recv {
                                Ok(source) => source,
                                Err(_) => break,
                            },
                        };
                        if !admit(&window, &source) {
                            tracing::trace!(source = %source.display(), "Recently attempted; skipping");
                            continue;
                        }
                        if let Err(error) = generator.generate(&source).await {
                            tracing::warn!(source = %source.display(), error = %error, "Poster generation failed");
                        }
                    }
                    tracing::debug!(worker, "Poster worker stopped");
                })
            })
            .collect()
    }

    /// Close the queue; workers finish the backlog and stop.
    pub fn close(&self) {
        self.tx.close();
    }
}

fn admit(window: &Mutex<DedupWindow>, source: &Path) -> bool {
    window.lock().unwrap_or_else(PoisonError::into_inner).admit(source)
}

/// First sighting of a source within the TTL wins; repeats are rejected
/// until the entry expires.
struct DedupWindow {
    ttl: Duration,
    seen: HashMap<PathBuf, Instant>,
}

impl DedupWindow {
    fn new(ttl: Duration) -> Self {
        Self { ttl, seen: HashMap::new() }
    }

    /// Expired entries are dropped on every call, keeping the map
    /// proportional to the recent working set.
    fn admit(&mut self, source: &Path) -> bool {
        let now = Instant::now();
        let ttl = self.ttl;
        self.seen.retain(|_, stamp| now.duration_since(*stamp) < ttl);
        if self.seen.contains_key(source) {
            return false;
        }
        self.seen.insert(source.to_owned(), now);
        true
    }
}
