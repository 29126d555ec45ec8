//! Layered configuration for the glimpse media indexer.
//!
//! Settings merge from three layers, later layers winning: built-in
//! defaults, an optional configuration file (YAML, TOML or JSON, picked by
//! extension), and `GLIMPSE_`-prefixed environment variables with `__`
//! separating nesting levels, e.g. `GLIMPSE_RESOURCE__BASE=/mnt/media`.

pub mod error;

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result};

/// File consulted when no explicit path is given. Looked up in the working
/// directory and its parents, so running from a subdirectory of the library
/// still finds it.
pub const DEFAULT_FILE: &str = "glimpse.yaml";

const ENV_PREFIX: &str = "GLIMPSE_";

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The media library to index.
    pub resource: ResourceConfig,
    /// Directory holding the cache artifacts and generated posters.
    pub cache: PathBuf,
    pub scan: ScanConfig,
    pub poster: PosterConfig,
    pub tools: ToolsConfig,
}

/// Where the media lives and what to make of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Library root. Everything the indexer serves is addressed relative to
    /// this directory.
    pub base: PathBuf,
    /// Paths under `base` to skip entirely, relative to `base`.
    pub exclude: Vec<String>,
    /// Synthetic top-level albums. Each entry merges the listed source
    /// directories (relative to `base`) under a single name.
    pub virtual_paths: BTreeMap<String, Vec<String>>,
    /// Tags dropped when aggregating tag statistics.
    pub tag_blacklist: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum seconds between two scans of the library. Triggers arriving
    /// inside the window are ignored.
    pub window_secs: u64,
}

/// Knobs for the poster extraction queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterConfig {
    /// Concurrent ffmpeg invocations.
    pub concurrency: usize,
    /// Seconds a completed source stays in the dedup set.
    pub dedup_ttl_secs: u64,
    /// Bounded queue depth; submissions beyond it are dropped.
    pub capacity: usize,
}

/// Paths to the external ffmpeg tools. Left unset, the binaries are
/// discovered on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffprobe: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource: ResourceConfig::default(),
            cache: default_cache_dir(),
            scan: ScanConfig::default(),
            poster: PosterConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            base: PathBuf::from("."),
            exclude: Vec::new(),
            virtual_paths: BTreeMap::new(),
            tag_blacklist: Vec::new(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { window_secs: 300 }
    }
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self { concurrency: 1, dedup_ttl_secs: 10, capacity: 64 }
    }
}

impl ScanConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl PosterConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }
}

impl Config {
    /// Merge defaults, the configuration file, and the environment, then
    /// validate the result.
    ///
    /// An explicitly given `path` must exist; the implicit [`DEFAULT_FILE`]
    /// may be absent, in which case defaults and environment alone apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Figment::from(Serialized::defaults(Self::default()));
        let layered = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading configuration file");
                match path.extension().and_then(OsStr::to_str) {
                    Some("toml") => defaults.merge(Toml::file_exact(path)),
                    Some("json") => defaults.merge(Json::file_exact(path)),
                    _ => defaults.merge(Yaml::file_exact(path)),
                }
            }
            None => defaults.merge(Yaml::file(DEFAULT_FILE)),
        };
        let config: Self = layered
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.resource.base.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("resource.base must not be empty".to_owned()));
        }
        for path in &self.resource.exclude {
            if Path::new(path).is_absolute() {
                exn::bail!(ErrorKind::Invalid(format!(
                    "exclude path {path} must be relative to resource.base"
                )));
            }
        }
        for (name, sources) in &self.resource.virtual_paths {
            if name.is_empty() || name.contains('/') {
                exn::bail!(ErrorKind::Invalid(format!(
                    "virtual path name {name:?} must be a bare directory name"
                )));
            }
            for source in sources {
                if Path::new(source).is_absolute() {
                    exn::bail!(ErrorKind::Invalid(format!(
                        "virtual path source {source} must be relative to resource.base"
                    )));
                }
            }
        }
        if self.scan.window_secs == 0 {
            exn::bail!(ErrorKind::Invalid("scan.window_secs must be positive".to_owned()));
        }
        Ok(())
    }
}

/// Platform cache directory for glimpse, falling back to a local `.cache`
/// when the platform offers none.
fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "glimpse")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".cache"))
}
