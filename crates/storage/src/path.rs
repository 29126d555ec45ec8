//! Path validation and security utilities.
//!
//! Every path handed to a storage backend is relative to that backend's root;
//! validation prevents traversal out of it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage path for security and correctness.
/// Ensures that paths don't escape the storage root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Returns
/// Returns the normalized path if valid, or [`InvalidPath`](crate::error::ErrorKind::InvalidPath)
/// if invalid.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use glimpse_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("albums/2024/beach.jpg").is_ok());
/// assert!(validate_path("a/b/c/clip.mp4").is_ok());
/// assert!(validate_path("a/../clip.mp4").is_ok()); // (never leaves the root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err()); // (leaves the root)
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././correct//./pic.jpg/").unwrap(),
///     Path::new("correct/pic.jpg")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    // Use Rust's built-in path component parser for robust handling. Means we
    // don't have to deal with non-UTF8, or the maniacs on Unix that use
    // backslashes in their filenames.
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls — reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert_eq!(validate(Path::new("albums/2024/beach.jpg")).unwrap(), Path::new("albums/2024/beach.jpg"));
        assert_eq!(validate(Path::new("a/b/c/clip.mp4")).unwrap(), Path::new("a/b/c/clip.mp4"));
        assert_eq!(validate(Path::new("simple.png")).unwrap(), Path::new("simple.png"));
    }

    #[test]
    fn test_path_normalization() {
        // Double slashes are normalized
        assert_eq!(validate(Path::new("a//b//c")).unwrap(), Path::new("a/b/c"));
        // Current directory references removed
        assert_eq!(validate(Path::new("a/./b/./c")).unwrap(), Path::new("a/b/c"));
    }

    #[test]
    fn test_traversal_attempts() {
        // Basic parent directory reference
        assert!(validate(Path::new("../etc/passwd")).is_err());
        // Traversal in the middle
        assert!(validate(Path::new("a/../../b")).is_err());
        // Only parent references
        assert!(validate(Path::new("..")).is_err());
        assert!(validate(Path::new("../..")).is_err());
    }

    #[test]
    fn test_reverse_attempts() {
        // Traversal remains within the root
        assert_eq!(validate(Path::new("a/b/..")).unwrap(), Path::new("a"));
    }

    #[test]
    fn test_invalid_characters() {
        // Null byte
        assert!(validate(Path::new("a\0b")).is_err());
        assert!(validate(Path::new("\0")).is_err());
    }

    #[test]
    fn test_empty_paths() {
        // Empty string
        assert!(validate(Path::new("")).is_err());
        // Only dots and slashes (normalizes to empty)
        assert!(validate(Path::new(".")).is_err());
        assert!(validate(Path::new("./")).is_err());
        assert!(validate(Path::new("//")).is_err());
    }

    #[test]
    fn test_trailing_slashes() {
        // Trailing slashes should be stripped
        assert_eq!(validate(Path::new("shoots/")).unwrap(), Path::new("shoots"));
        assert_eq!(validate(Path::new("a/b/c/")).unwrap(), Path::new("a/b/c"));
        assert_eq!(validate(Path::new("clip.mp4/")).unwrap(), Path::new("clip.mp4"));
    }
}
