//! Periodic rescan scheduling.
//!
//! One worker loop owns the scanner; everything else just pokes it through a
//! capacity-one trigger channel. Requests inside the freshness window, or
//! while another request is already pending, are dropped on the floor, so
//! hammering [`trigger`](ScanScheduler::trigger) from request handlers costs
//! nothing.

use crate::scanner::Scanner;
use async_channel::{Receiver, Sender};
use glimpse_index::DirectoryNode;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// How long a finished scan keeps the tree fresh.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(300);

pub struct ScanScheduler {
    scanner: Arc<Scanner>,
    root: Arc<DirectoryNode>,
    window: Duration,
    /// Unix seconds of the last completed scan; zero means never.
    last_scan: AtomicI64,
    trigger_tx: Sender<()>,
    trigger_rx: Receiver<()>,
}

impl ScanScheduler {
    pub fn new(scanner: Arc<Scanner>, root: Arc<DirectoryNode>, window: Duration) -> Self {
        let (trigger_tx, trigger_rx) = async_channel::bounded(1);
        Self {
            scanner,
            root,
            window,
            last_scan: AtomicI64::new(0),
            trigger_tx,
            trigger_rx,
        }
    }

    /// Request a rescan if the last one is older than the freshness window.
    /// Never blocks; a pending request absorbs any number of calls.
    pub fn trigger(&self) {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if now - self.last_scan.load(Ordering::Relaxed) <= self.window.as_secs() as i64 {
            return;
        }
        if self.trigger_tx.try_send(()).is_ok() {
            tracing::info!("Tree freshness window expired, rescan requested");
        }
    }

    /// Replay the cached snapshot so there is something to serve right away,
    /// then request a full scan to reconcile the tree with storage.
    pub async fn warm_up(&self) {
        match self.scanner.restore(&self.root).await {
            Ok(count) if count > 0 => {
                tracing::info!(restored = count, "Warm up complete, service ready");
            }
            Ok(_) => tracing::info!("Cache incomplete, waiting for scan"),
            Err(error) => {
                tracing::warn!(error = %error, "Cache restore failed, waiting for scan");
            }
        }
        // The replayed tree may be stale; always reconcile with storage.
        let _ = self.trigger_tx.send(()).await;
    }

    /// Run scans as they are requested, until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Scan loop exiting");
                    break;
                }
                request = self.trigger_rx.recv() => {
                    if request.is_err() {
                        break;
                    }
                    self.scanner.scan(&self.root).await;
                    self.last_scan
                        .store(OffsetDateTime::now_utc().unix_timestamp(), Ordering::Relaxed);
                }
            }
        }
    }
}
