//! Archival cycle configuration.

use serde::Deserialize;

/// Settings controlling one archival cycle.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Whether log archiving is enabled.
    /// Default: false (must be explicitly enabled)
    #[serde(default)]
    pub enable: bool,

    /// Wall-clock budget for one cycle's extraction loop, in seconds.
    /// Time inside a single blocking call is not separately bounded.
    /// Default: 86400 (one day)
    #[serde(default = "default_max_runtime_secs")]
    pub max_runtime_secs: u64,

    /// Rows older than this many months become eligible for archival.
    /// A month is standardised to 30 days.
    /// Default: 18
    #[serde(default = "default_max_log_age_months")]
    pub max_log_age_months: u32,

    /// Prefix for archive object keys. Alphabetic characters only.
    #[serde(default)]
    pub prefix: String,

    /// Rows fetched per page during extraction.
    /// Default: 1000
    #[serde(default = "default_page_size")]
    pub page_size: i64,

    /// Rows deleted per statement after a confirmed upload.
    /// Bounds statement size; does not change what gets deleted.
    /// Default: 1000
    #[serde(default = "default_delete_batch")]
    pub delete_batch: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enable: false,
            max_runtime_secs: default_max_runtime_secs(),
            max_log_age_months: default_max_log_age_months(),
            prefix: String::new(),
            page_size: default_page_size(),
            delete_batch: default_delete_batch(),
        }
    }
}

fn default_max_runtime_secs() -> u64 {
    86400
}

fn default_max_log_age_months() -> u32 {
    18
}

fn default_page_size() -> i64 {
    1000
}

fn default_delete_batch() -> usize {
    1000
}

impl ArchiveConfig {
    /// Age threshold in seconds (months standardised to 30 days).
    pub fn max_age_secs(&self) -> i64 {
        60 * 60 * 24 * 30 * i64::from(self.max_log_age_months)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.prefix.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!(
                "archive.prefix must contain only alphabetic characters, got {:?}",
                self.prefix
            ));
        }
        if self.page_size <= 0 {
            return Err("archive.page_size must be positive".into());
        }
        if self.delete_batch == 0 {
            return Err("archive.delete_batch must be positive".into());
        }
        Ok(())
    }
}
