//! Scan Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A scan error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Per-file trouble during a scan is logged and the file skipped, never
/// surfaced. Only the cache round-trips can fail a caller.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Loading or persisting cache artifacts failed.
    #[display("cache access failed")]
    Cache,
}
