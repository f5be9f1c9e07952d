//! `strata.toml` configuration file.
//!
//! ```toml
//! path = "db/evolutions"
//! version = "latest"
//! state_file = "db/.evolution.json"
//! extension = "toml"
//! ```
//!
//! Every key is optional. Relative paths are resolved against the directory
//! containing the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::error::{Result, StrataError};

/// File name looked up in the current directory when no config is given.
pub const CONFIG_FILE_NAME: &str = "strata.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrataConfig {
    /// Evolution directory.
    pub path: Option<PathBuf>,
    /// Target version, or `latest`.
    pub version: Option<String>,
    /// Shared state file. Defaults to `<path>/.evolution.json`.
    pub state_file: Option<PathBuf>,
    /// Extension of change-script files. Defaults to `toml`.
    pub extension: Option<String>,
}

impl StrataConfig {
    /// Parses a config from TOML text. Paths are left as written.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StrataError::config(format!("invalid {}: {}", CONFIG_FILE_NAME, e)))
    }

    /// Loads a config file and resolves its relative paths against the
    /// file's directory.
    pub fn load(file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file).map_err(|e| {
            StrataError::config(format!("cannot read config '{}': {}", file.display(), e))
        })?;
        let config = Self::parse(&content)?;

        let base = file.parent().unwrap_or_else(|| Path::new("."));
        Ok(config.resolve_against(base))
    }

    /// Loads `explicit` if given, otherwise `strata.toml` in `cwd` if it
    /// exists, otherwise returns an empty config.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(file) = explicit {
            return Self::load(file);
        }

        let candidate = cwd.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(file = %candidate.display(), "Loading config");
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    fn resolve_against(mut self, base: &Path) -> Self {
        self.path = self.path.map(|p| base.join(p));
        self.state_file = self.state_file.map(|p| base.join(p));
        self
    }

    /// Overlays `other` on top of `self`: keys set in `other` win.
    pub fn merge(self, other: StrataConfig) -> Self {
        Self {
            path: other.path.or(self.path),
            version: other.version.or(self.version),
            state_file: other.state_file.or(self.state_file),
            extension: other.extension.or(self.extension),
        }
    }
}
