//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The directory (and, when picking across subtrees, everything below it)
    /// holds no image to choose from.
    #[display("no image under /{_0}")]
    NoImage(#[error(not(source))] String),
}
