//! Runtime configuration for embedding hosts and the CLI.

use crate::logging::{default_log_level, normalize_level};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "COURSEKIT_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "COURSEKIT_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "COURSEKIT_LOG_DIR";

#[derive(Debug)]
pub enum ConfigError {
    /// Variable is set but blank.
    EmptyValue(&'static str),
    UnsupportedLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue(key) => write!(f, "`{key}` is set but empty"),
            Self::UnsupportedLogLevel(level) => write!(f, "unsupported log level `{level}`"),
        }
    }
}

impl Error for ConfigError {}

/// Engine settings.
///
/// `db_path: None` runs on an in-memory database; `log_dir: None` leaves
/// logging to the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Defaults overridden by `COURSEKIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by the `COURSEKIT_*` names.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = non_blank(&lookup, ENV_DB_PATH)? {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(level) = non_blank(&lookup, ENV_LOG_LEVEL)? {
            self.log_level = level;
        }
        if let Some(dir) = non_blank(&lookup, ENV_LOG_DIR)? {
            self.log_dir = Some(PathBuf::from(dir));
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level)
            .map(|_| ())
            .map_err(|_| ConfigError::UnsupportedLogLevel(self.log_level.clone()))
    }
}

fn non_blank(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<String>, ConfigError> {
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key)),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}
