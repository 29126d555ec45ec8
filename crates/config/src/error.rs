//! Config Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or deserializing the configuration sources failed. The
    /// figment error underneath names the offending file or variable.
    #[display("failed to load configuration")]
    Load,
    /// The merged configuration is structurally sound but semantically
    /// unusable.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
}
