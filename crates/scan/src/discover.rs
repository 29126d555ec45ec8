//! Item sources for the scan pipeline.
//!
//! Two ways to feed the pipeline: walk the origin backend (a real scan) or
//! replay a persisted snapshot (warm start). Both produce the same stream of
//! [`ScanItem`]s, so downstream stages never know where an item came from.

use async_channel::{Receiver, Sender};
use glimpse_index::ScanItem;
use glimpse_storage::media::{self, MediaKind};
use glimpse_storage::{BackendHandle, StorageBackend};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Directory walkers racing over the shared task queue.
const DISCOVERY_WORKERS: usize = 8;
/// Items buffered between a source and the probe stage.
const SOURCE_BUFFER: usize = 2000;

/// One directory waiting to be walked.
struct DirTask {
    path: String,
    name: String,
}

/// Walk the origin backend and stream one item per visible entry.
///
/// Each worker emits the directory's own item first, then its files, then
/// queues subdirectories for whichever worker grabs them next. The output
/// channel closes once every queued directory has been walked.
pub(crate) fn start_discovery(
    origin: BackendHandle,
    exclude: Arc<HashSet<String>>,
) -> Receiver<ScanItem> {
    let (out_tx, out_rx) = async_channel::bounded(SOURCE_BUFFER);
    let (task_tx, task_rx) = async_channel::unbounded();
    // The root counts as pending from the start, so the counter cannot hit
    // zero before the first worker picks it up.
    let pending = Arc::new(AtomicUsize::new(1));
    let _ = task_tx.try_send(DirTask { path: String::new(), name: String::new() });
    for _ in 0..DISCOVERY_WORKERS {
        let origin = Arc::clone(&origin);
        let exclude = Arc::clone(&exclude);
        let out = out_tx.clone();
        let tasks = task_tx.clone();
        let task_rx = task_rx.clone();
        let pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Ok(task) = task_rx.recv().await {
                walk_dir(&origin, &exclude, task, &out, &tasks, &pending).await;
                if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                    // Last pending directory done; closing the task queue
                    // releases the sibling workers.
                    tasks.close();
                }
            }
        });
    }
    out_rx
}

async fn walk_dir(
    origin: &BackendHandle,
    exclude: &HashSet<String>,
    task: DirTask,
    out: &Sender<ScanItem>,
    tasks: &Sender<DirTask>,
    pending: &AtomicUsize,
) {
    let target = (!task.path.is_empty()).then(|| Path::new(&task.path));
    let entries = match origin.read_dir(target).await {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(path = %task.path, error = %error, "Directory listing failed, treating as empty");
            Vec::new()
        }
    };
    // The directory's own item goes first, so its node is claimed for this
    // scan even when the directory turns out to be empty.
    let _ = out.send(ScanItem::directory(&task.path, &task.name)).await;
    for entry in entries {
        let path = child_path(&task.path, &entry.name);
        if exclude.contains(&path) {
            tracing::debug!(path, "Excluded from scan");
            continue;
        }
        if !media::is_visible(&entry.name) {
            continue;
        }
        if entry.is_dir {
            pending.fetch_add(1, Ordering::AcqRel);
            let _ = tasks.send(DirTask { path, name: entry.name }).await;
            continue;
        }
        let item = match media::classify(&entry.name) {
            MediaKind::Picture => ScanItem::image(path, entry.name),
            MediaKind::Video => ScanItem::video(path, entry.name),
            MediaKind::Other => ScanItem::file(path, entry.name),
        };
        let _ = out.send(item).await;
    }
}

fn child_path(dir: &str, name: &str) -> String {
    if dir.is_empty() { name.to_owned() } else { format!("{dir}/{name}") }
}

/// Stream a persisted snapshot through the pipeline as if it had just been
/// discovered. No storage access happens here; the items already carry
/// everything the downstream stages would otherwise have to look up.
pub(crate) fn replay(items: Vec<ScanItem>) -> Receiver<ScanItem> {
    let (tx, rx) = async_channel::bounded(SOURCE_BUFFER);
    tokio::spawn(async move {
        for item in items {
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });
    rx
}
