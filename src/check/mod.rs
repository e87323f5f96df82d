//! Composed status check for the archive delivery path.

use tracing::debug;

use crate::services::ObjectStore;

/// Severity of a status check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
}

/// Outcome of the composed status check.
#[derive(Debug, Clone)]
pub struct StatusResult {
    pub level: StatusLevel,
    pub summary: String,
}

impl StatusResult {
    fn new(level: StatusLevel, summary: impl Into<String>) -> Self {
        Self {
            level,
            summary: summary.into(),
        }
    }
}

/// Probe the archive delivery path, short-circuiting on the first failure:
/// connectivity, then write permissions, then the enable flag.
///
/// Read-only apart from the permission probe's own test-and-cleanup write.
pub async fn run_status_check(store: &dyn ObjectStore, archiving_enabled: bool) -> StatusResult {
    let connection = store.test_connection().await;
    if !connection.success {
        return StatusResult::new(
            StatusLevel::Error,
            format!("S3 connection failure: {}", connection.details),
        );
    }

    let permissions = store.test_permissions().await;
    if !permissions.success {
        return StatusResult::new(
            StatusLevel::Error,
            format!("S3 write failure: {}", permissions.details),
        );
    }

    if !archiving_enabled {
        return StatusResult::new(
            StatusLevel::Warning,
            "S3 is reachable and writable, but log archiving is disabled",
        );
    }

    debug!("Status check passed");
    StatusResult::new(StatusLevel::Ok, "S3 connection OK")
}
