// Configuration source
// Supplies the role/party table and the opaque execution-target selectors.
// Loaded once from YAML before any pipeline is built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::party::RoleTable;

/// Opaque compute-substrate selector, passed through to the runner
/// unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backend(pub u32);

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque execution-strategy selector, passed through to the runner
/// unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkMode(pub u32);

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("config not found at: {0}")]
    NotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Run configuration: who participates and where work executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub parties: RoleTable,
    pub backend: Backend,
    pub work_mode: WorkMode,
}

impl Config {
    /// Load a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse_str(&content)
    }

    /// Parse a configuration from a YAML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        if config.parties.guest.is_empty() {
            return Err(ConfigError::Invalid(
                "parties.guest must name at least one party".to_string(),
            ));
        }
        Ok(config)
    }
}
