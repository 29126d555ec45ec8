//! Probe Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A probe error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for probe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("ffprobe not detected on your system")]
    ProbeNotFound,
    /// ffprobe refused the file or produced unusable output. Carries the
    /// trimmed combined stdout+stderr, the only diagnostic the ffmpeg tools
    /// give when `-v error` is set.
    #[display("probe failed: {_0}")]
    ProbeFailed(#[error(not(source))] String),
    /// Failed to spawn or wait on the external process.
    Io,
}
