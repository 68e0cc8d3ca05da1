//! Path resolution for analyst configuration files.
//!
//! ```text
//! ~/.config/traffic-analyst/   # Config directory (platform default via `dirs`)
//! └── config.toml              # Flat key/value settings and persisted roles
//! ```

use analyst_core::{AnalystError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "traffic-analyst";
const CONFIG_FILE: &str = "config.toml";

pub struct AnalystPaths;

impl AnalystPaths {
    /// Returns the analyst configuration directory.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| AnalystError::storage("Cannot find config directory"))
    }

    /// Returns the path to `config.toml`.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }
}
