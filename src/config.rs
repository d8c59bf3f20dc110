use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default settings file name, resolved relative to the working directory
/// unless overridden on the command line.
pub const DEFAULT_SETTINGS_FILE: &str = "lenscan.toml";

/// User settings persisted between sessions: the API key and the global
/// strict-mode flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub strict_mode: bool,
}

impl Settings {
    /// Load settings from a TOML file. A missing file yields defaults; a
    /// malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("{} is not a valid settings file", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("serialize settings")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}
