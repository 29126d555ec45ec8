use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use glimpse_probe::{MediaProber, ProberHandle};
use glimpse_storage::{BackendHandle, StorageBackend, media};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

/// ffmpeg filter selecting only keyframes; the default attempt grabs the
/// first I-frame without seeking.
const POSTER_FILTER: &str = r"select=eq(pict_type\,I)";

/// Cover art that stands in for a generated poster. `cover.webp` is listed
/// for forward compatibility but the picture classifier currently rejects it.
const COVER_CANDIDATES: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png", "cover.webp"];

/// Cache-relative location of the poster for a video.
pub fn poster_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".poster.jpg");
    PathBuf::from(name)
}

/// In-progress frames land next to the final poster and are renamed over it
/// once the extraction succeeds.
fn scratch_path(poster: &Path) -> PathBuf {
    let mut name = poster.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Seek offset for the retry attempt, by duration tier.
///
/// Very short clips aim for their midpoint, capped at two seconds; anything
/// longer seeks a fixed distance in to clear intros and black lead-ins.
/// Non-positive or non-finite durations have no usable offset.
pub fn offset_for(duration_sec: f64) -> Option<f64> {
    if !duration_sec.is_finite() || duration_sec <= 0.0 {
        return None;
    }
    Some(if duration_sec <= 30.0 {
        (duration_sec / 2.0).min(2.0)
    } else if duration_sec <= 300.0 {
        30.0
    } else {
        45.0
    })
}

fn format_offset(offset_sec: f64) -> String {
    format!("{offset_sec:.3}")
}

/// Argument list for the no-seek keyframe attempt.
fn attempt_args(input: &Path, output: &Path) -> Vec<String> {
    build_args(input, output, None)
}

/// Argument list for the retry attempt; `-ss` goes before `-i` so ffmpeg
/// seeks on the demuxer instead of decoding its way to the offset.
fn attempt_with_offset_args(input: &Path, output: &Path, offset_sec: f64) -> Vec<String> {
    build_args(input, output, Some(offset_sec))
}

fn build_args(input: &Path, output: &Path, seek_sec: Option<f64>) -> Vec<String> {
    let mut args = vec!["-v".to_owned(), "error".to_owned(), "-y".to_owned()];
    if let Some(offset) = seek_sec {
        args.push("-ss".to_owned());
        args.push(format_offset(offset));
    }
    args.extend([
        "-i".to_owned(),
        input.display().to_string(),
        "-vf".to_owned(),
        POSTER_FILTER.to_owned(),
        "-frames:v".to_owned(),
        "1".to_owned(),
        "-pix_fmt".to_owned(),
        "yuvj420p".to_owned(),
        output.display().to_string(),
    ]);
    args
}

/// True when `source` already has a poster: sibling cover art in the origin
/// tree, or a previously extracted frame in the cache.
pub async fn poster_exists(origin: &BackendHandle, cache: &BackendHandle, source: &Path) -> bool {
    let parent = source.parent().unwrap_or(Path::new(""));
    for candidate in COVER_CANDIDATES {
        if !media::is_picture(candidate) {
            continue;
        }
        if origin.exists(&parent.join(candidate)).await.unwrap_or(false) {
            return true;
        }
    }
    cache.exists(&poster_path(source)).await.unwrap_or(false)
}

/// Produces one poster frame for a video.
#[async_trait]
pub trait PosterGenerator: Send + Sync {
    /// Generate a poster for `source` (a video path relative to the origin
    /// backend) unless one already exists.
    async fn generate(&self, source: &Path) -> Result<()>;
}

/// Runs one fully-argued extraction attempt.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<()>;
}

/// Supplies an already-known duration for a video when one is still
/// trustworthy; returning `None` sends the generator to a live probe.
#[async_trait]
pub trait DurationSource: Send + Sync {
    async fn duration_of(&self, source: &Path) -> Option<f64>;
}

/// The `ffmpeg` executable.
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    /// Locate `ffmpeg` on the `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which("ffmpeg") {
            Ok(binary) => {
                tracing::info!(binary = %binary.display(), "Discovered ffmpeg");
                Ok(Self { binary })
            }
            Err(_) => {
                tracing::info!("ffmpeg executable not found in PATH");
                exn::bail!(ErrorKind::FfmpegNotFound);
            }
        }
    }

    /// Use an explicitly configured binary instead of searching the `PATH`.
    pub fn at(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

#[async_trait]
impl FrameExtractor for Ffmpeg {
    async fn run(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.binary).args(args).output().await.or_raise(|| ErrorKind::Io)?;
        if !output.status.success() {
            let diagnostic = combined_text(&output.stdout, &output.stderr);
            let diagnostic = if diagnostic.is_empty() {
                format!("ffmpeg exited with {}", output.status)
            } else {
                diagnostic
            };
            exn::bail!(ErrorKind::ExtractFailed(diagnostic));
        }
        Ok(())
    }
}

fn combined_text(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut text = String::with_capacity(stdout.len() + stderr.len() + 1);
    text.push_str(stdout.trim());
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(stderr.trim());
    }
    text
}

/// Poster generation against real backends and an injectable extractor.
///
/// The two-attempt strategy comes from how ffmpeg behaves on real libraries:
/// the keyframe filter alone is fast and usually lands a good frame, but on
/// some files (typically stream copies with broken indexes) it exits without
/// producing anything, and seeking first gets past the damage.
pub struct FfmpegPosterGenerator {
    origin: BackendHandle,
    cache: BackendHandle,
    durations: Arc<dyn DurationSource>,
    prober: ProberHandle,
    extractor: Arc<dyn FrameExtractor>,
}

impl FfmpegPosterGenerator {
    pub fn new(
        origin: BackendHandle,
        cache: BackendHandle,
        durations: Arc<dyn DurationSource>,
        prober: ProberHandle,
        extractor: Arc<dyn FrameExtractor>,
    ) -> Self {
        Self { origin, cache, durations, prober, extractor }
    }

    /// Cached duration when fresh, live probe otherwise.
    async fn resolve_duration(&self, source: &Path, input: &Path) -> Result<f64> {
        if let Some(duration) = self.durations.duration_of(source).await {
            return Ok(duration);
        }
        let probe = self.prober.probe(input).await.or_raise(|| ErrorKind::DurationUnavailable)?;
        Ok(probe.duration_sec)
    }
}

#[async_trait]
impl PosterGenerator for FfmpegPosterGenerator {
    async fn generate(&self, source: &Path) -> Result<()> {
        let poster = poster_path(source);
        if poster_exists(&self.origin, &self.cache, source).await {
            tracing::debug!(source = %source.display(), "Poster already present; skipping");
            return Ok(());
        }
        let input = self.origin.absolute(source).or_raise(|| ErrorKind::Storage)?;
        let scratch = scratch_path(&poster);
        // Carves out the parent directory in the cache so ffmpeg can write
        // there directly.
        self.cache.write(&scratch, &[]).await.or_raise(|| ErrorKind::Storage)?;
        let output = self.cache.absolute(&scratch).or_raise(|| ErrorKind::Storage)?;

        if let Err(first) = self.extractor.run(&attempt_args(&input, &output)).await {
            tracing::debug!(
                source = %source.display(),
                error = %first,
                "Keyframe attempt produced nothing; retrying with a seek"
            );
            let duration = self.resolve_duration(source, &input).await?;
            let Some(offset) = offset_for(duration) else {
                exn::bail!(ErrorKind::DurationUnavailable);
            };
            self.extractor.run(&attempt_with_offset_args(&input, &output, offset)).await?;
        }
        self.cache.rename(&scratch, &poster).await.or_raise(|| ErrorKind::Storage)?;
        tracing::info!(source = %source.display(), poster = %poster.display(), "Poster generated");
        Ok(())
    }
}
