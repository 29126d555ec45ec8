//! Shared stubs for the scan tests.

use async_trait::async_trait;
use glimpse_poster::{PosterGenerator, PosterQueue};
use glimpse_probe::{MediaProber, VideoProbe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Minimal GIF: header, logical screen descriptor, trailer. Enough for a
/// header decode to report dimensions; no palette, no frames. One pad byte
/// follows the trailer: the gif pull-parser only finishes the header once it
/// can read past the block introducer, so a stream ending exactly at the
/// trailer reports `UnexpectedEof` before the dimensions are available.
pub(crate) fn gif_bytes(width: u16, height: u16) -> Vec<u8> {
    let mut bytes = Vec::from(*b"GIF89a");
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x3B, 0x00]);
    bytes
}

/// Prober that always reports the same result and counts its calls.
pub(crate) struct ScriptedProber {
    result: VideoProbe,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub(crate) fn new(width: u32, height: u32, duration_sec: f64) -> Self {
        Self {
            result: VideoProbe { width, height, duration_sec },
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for ScriptedProber {
    async fn probe(&self, _path: &Path) -> glimpse_probe::error::Result<VideoProbe> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result)
    }
}

/// Prober that refuses every file.
#[derive(Default)]
pub(crate) struct FailingProber {
    calls: AtomicUsize,
}

impl FailingProber {
    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProber for FailingProber {
    async fn probe(&self, _path: &Path) -> glimpse_probe::error::Result<VideoProbe> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        exn::bail!(glimpse_probe::error::ErrorKind::ProbeFailed("no usable stream".to_owned()))
    }
}

/// Poster generator that records what it was asked to generate.
#[derive(Default)]
pub(crate) struct RecordingGenerator {
    seen: Mutex<Vec<PathBuf>>,
}

impl RecordingGenerator {
    pub(crate) fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PosterGenerator for RecordingGenerator {
    async fn generate(&self, source: &Path) -> glimpse_poster::error::Result<()> {
        self.seen.lock().unwrap().push(source.to_owned());
        Ok(())
    }
}

/// Run the queue's workers until every already-enqueued job is done.
pub(crate) async fn drain(queue: &PosterQueue) {
    queue.close();
    for worker in queue.run(CancellationToken::new()) {
        worker.await.unwrap();
    }
}
