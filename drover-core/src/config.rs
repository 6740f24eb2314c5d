use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::staging::{NewFilePolicy, StagingStrategy};

pub const CONFIG_FILE: &str = ".drover.toml";

/// Workflow defaults. Loaded from `.drover.toml` at the repository
/// root when present, then overridden by command-line flags. The
/// resolved value is passed explicitly into the workflow; session
/// state never lives in globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub branch_prefix: String,
    pub new_file_policy: NewFilePolicy,
    pub staging: StagingStrategy,
    pub diff_tool: Option<String>,
    pub merge_tool: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            branch_prefix: "drover".to_string(),
            new_file_policy: NewFilePolicy::Prompt,
            staging: StagingStrategy::Patch,
            diff_tool: None,
            merge_tool: None,
        }
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config {}: {}", self.path, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Defaults, overlaid with `.drover.toml` if the root carries one.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Config::default());
        }
        Config::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|err| ConfigError {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| ConfigError {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }
}
