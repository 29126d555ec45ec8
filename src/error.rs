//! Application Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. The binary wraps every crate's errors into these
//! coarse categories; the inner error tree keeps the detail.

use derive_more::{Display, Error};

/// An application error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration unusable")]
    Config,
    #[display("storage backend unavailable")]
    Storage,
    /// Scanning needs ffprobe; without it every video would be dropped.
    #[display("ffprobe is required for scanning")]
    Probe,
    #[display("no such directory in the index: {_0}")]
    UnknownPath(#[error(not(source))] String),
    #[display("failed to render output")]
    Render,
    #[display("interrupted while waiting for shutdown")]
    Signal,
}
