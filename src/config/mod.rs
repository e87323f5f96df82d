//! Typed configuration loaded from a TOML file.
//!
//! The configuration is constructed once per invocation and passed by
//! reference into each component; there is no process-wide settings object.

mod archive;
mod storage;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub use archive::ArchiveConfig;
pub use storage::{S3Config, S3Region};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level configuration.
///
/// # Example
///
/// ```toml
/// [database]
/// url = "sqlite:///var/lib/moodle/moodle.db"
///
/// [archive]
/// enable = true
/// max_runtime_secs = 86400
/// max_log_age_months = 18
/// prefix = "logs"
///
/// [s3]
/// bucket = "log-archive"
/// region = "ap-southeast-2"
/// key_id = "AKIA..."
/// secret_key = "..."
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3logsConfig {
    /// Connection settings for the database holding the log table.
    pub database: DatabaseConfig,

    /// Archival cycle behavior.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// S3 bucket and credential settings.
    #[serde(default)]
    pub s3: S3Config,
}

/// Database connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Database URL, e.g. `sqlite:///var/lib/moodle/moodle.db`.
    pub url: String,
}

impl S3logsConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: S3logsConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    ///
    /// An incomplete `[s3]` section is deliberately not an error here:
    /// "not configured" is a first-class state surfaced by the status
    /// check rather than a startup failure.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Validation(
                "database.url must not be empty".into(),
            ));
        }
        self.archive.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}
