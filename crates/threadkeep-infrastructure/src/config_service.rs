//! Configuration service implementation.
//!
//! Loads `ThreadkeepConfig` from `config.toml` in the config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use threadkeep_core::error::Result;
use tracing::debug;

use crate::paths::ThreadkeepPaths;
use crate::storage::AtomicTomlFile;

/// Default maximum length of a generated thread title, in characters.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 40;

/// User-editable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadkeepConfig {
    /// Storage root. Resolved through [`ThreadkeepPaths::data_dir`] when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_filter: String,
    pub title_max_chars: usize,
}

impl Default for ThreadkeepConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_filter: "warn".to_string(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

impl ThreadkeepConfig {
    /// The configured data directory, or the platform default.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => ThreadkeepPaths::data_dir(),
        }
    }
}

/// Reads and writes `config.toml`.
pub struct ConfigService {
    file: AtomicTomlFile<ThreadkeepConfig>,
}

impl ConfigService {
    /// A service bound to the default config file location.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(ThreadkeepPaths::config_file()?))
    }

    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Loads the configuration. A missing or empty file yields defaults.
    pub fn load(&self) -> Result<ThreadkeepConfig> {
        match self.file.load()? {
            Some(config) => Ok(config),
            None => {
                debug!("No config at {:?}, using defaults", self.file.path());
                Ok(ThreadkeepConfig::default())
            }
        }
    }

    pub fn save(&self, config: &ThreadkeepConfig) -> Result<()> {
        self.file.save(config)
    }
}
