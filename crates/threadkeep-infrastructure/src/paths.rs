//! Unified path management for threadkeep.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/threadkeep/        # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/threadkeep/   # Data directory
//! └── store/                   # Key/value entries (directory + histories)
//! ```
//!
//! Setting `THREADKEEP_HOME` puts both directories directly under that path.

use std::path::{Path, PathBuf};
use threadkeep_core::error::{Result, ThreadkeepError};

const APP_NAME: &str = "threadkeep";

/// Environment variable that relocates every threadkeep directory.
pub const HOME_ENV_VAR: &str = "THREADKEEP_HOME";

pub struct ThreadkeepPaths;

impl ThreadkeepPaths {
    fn home_override() -> Option<PathBuf> {
        std::env::var_os(HOME_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// Returns the threadkeep configuration directory.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(home) = Self::home_override() {
            return Ok(home);
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| ThreadkeepError::config("Cannot determine the config directory"))
    }

    /// Returns the threadkeep data directory.
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(home) = Self::home_override() {
            return Ok(home);
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or_else(|| ThreadkeepError::config("Cannot determine the data directory"))
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the key/value store root under `data_dir`.
    pub fn store_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("store")
    }
}
