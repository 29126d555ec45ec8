//! Poster Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A poster error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for poster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("ffmpeg not detected on your system")]
    FfmpegNotFound,
    /// The extraction attempt exited non-zero. Carries the trimmed combined
    /// stdout+stderr of the process.
    #[display("extract failed: {_0}")]
    ExtractFailed(#[error(not(source))] String),
    /// Neither the cached metadata nor a live probe produced a usable
    /// duration for the fallback seek.
    #[display("poster duration probe failed")]
    DurationUnavailable,
    /// Underlying storage backend trouble.
    Storage,
    /// Failed to spawn or wait on the external process.
    Io,
}
