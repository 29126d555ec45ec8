//! Cache Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a cache failure.
///
/// Only the structural snapshot can fail a load; the knowledge maps degrade
/// to empty instead of aborting.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A backend read or write of a cache artifact failed.
    #[display("cache artifact storage operation failed")]
    Storage,
    /// The structural snapshot exists but cannot be decoded.
    #[display("structural snapshot is corrupt")]
    CorruptSnapshot,
    /// A value failed to serialize before writing.
    #[display("failed to encode cache artifact")]
    Encode,
}
