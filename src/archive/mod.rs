//! Archival of aging log rows into immutable CSV objects.

pub mod keys;
pub mod writer;

pub use writer::{ArchiveError, ArchiveRunResult, run_archive_cycle};

/// Display name of the scheduled archival task in host run history.
pub const TASK_NAME: &str = "Process logs";
