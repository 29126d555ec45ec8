pub mod backend;
pub mod error;
mod file;
pub mod media;
mod path;

pub use crate::backend::StorageBackend;
pub use crate::file::{DirEntry, FileInfo};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
