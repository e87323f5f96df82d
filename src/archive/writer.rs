//! The archive writer: one bounded extract-serialize-upload-delete cycle.
//!
//! Rows are only ever deleted after their containing artifact is
//! confirmed durably stored. There is no transaction spanning
//! extraction, upload and delete; a crash between upload and delete
//! leaves rows present in both places, and the next cycle re-archives
//! them. The archive is authoritative for retention, so duplicates are
//! an accepted operational cost.

use std::path::PathBuf;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    archive::keys,
    config::ArchiveConfig,
    db::{DbError, LogStore},
    services::{ObjectStore, StorageError},
};

/// Errors that abort an archive cycle.
///
/// Both fatal variants leave all state safely reprocessable: nothing has
/// been deleted from the table, and on upload failure the temp artifact
/// stays on disk for operator inspection.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to write the CSV header for the archive artifact")]
    HeaderWrite,

    #[error("Upload of {key} failed, artifact kept at {}: {source}", artifact.display())]
    UploadFailed {
        key: String,
        artifact: PathBuf,
        source: StorageError,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Results from a single archive cycle.
#[derive(Debug, Default)]
pub struct ArchiveRunResult {
    /// Number of page fetches issued against the log table.
    pub pages_fetched: u32,
    /// Number of rows written to the artifact and deleted after upload.
    pub rows_archived: u64,
    /// Key of the uploaded object, when anything was archived.
    pub key: Option<String>,
    /// URL of the uploaded object, when anything was archived.
    pub object_url: Option<String>,
}

impl ArchiveRunResult {
    /// True when the cycle found nothing to archive.
    pub fn is_noop(&self) -> bool {
        self.rows_archived == 0
    }
}

/// Run one archive cycle.
///
/// Extracts pages of rows older than the retention threshold into a temp
/// CSV artifact until a short page or the wall-clock deadline ends the
/// loop, uploads the artifact, then deletes exactly the extracted ids in
/// chunks. Rows left behind by an exhausted time budget are picked up by
/// the next scheduled run.
pub async fn run_archive_cycle(
    db: &LogStore,
    store: &dyn ObjectStore,
    config: &ArchiveConfig,
) -> Result<ArchiveRunResult, ArchiveError> {
    let now = Utc::now();
    let threshold = now.timestamp() - config.max_age_secs();
    let deadline = now + Duration::seconds(config.max_runtime_secs as i64);

    info!(threshold, "Archiving rows created at or before threshold");

    let columns = db.columns().await?;
    if columns.is_empty() {
        return Err(ArchiveError::HeaderWrite);
    }

    let temp = tempfile::Builder::new()
        .prefix("s3logs_")
        .suffix(".csv")
        .tempfile()?;
    // Detach the artifact from the tempfile guard: it must survive this
    // function on upload failure.
    let (file, artifact) = temp.keep().map_err(|e| ArchiveError::Io(e.error))?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&columns)?;
    writer.flush()?;
    if std::fs::metadata(&artifact)?.len() == 0 {
        let _ = std::fs::remove_file(&artifact);
        return Err(ArchiveError::HeaderWrite);
    }

    let mut ids: Vec<i64> = Vec::new();
    let mut pages_fetched = 0u32;
    let mut offset = 0i64;

    while Utc::now() <= deadline {
        let rows = db.fetch_page(threshold, config.page_size, offset).await?;
        pages_fetched += 1;

        if rows.is_empty() {
            debug!("Extraction finished before the time budget was reached");
            break;
        }

        offset += config.page_size;
        let short_page = (rows.len() as i64) < config.page_size;

        for row in &rows {
            ids.push(row.id);
            writer.write_record(row.to_field_vec())?;
        }

        // A short page means the table is exhausted; don't wait out the
        // remaining budget on an empty fetch.
        if short_page {
            break;
        }
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e.to_string())))?;
    file.sync_all()?;
    drop(file);

    if ids.is_empty() {
        info!("No rows eligible for archival, finishing");
        // Best-effort cleanup; a leftover empty artifact must not turn a
        // no-op cycle into a failure.
        if let Err(e) = std::fs::remove_file(&artifact) {
            warn!(artifact = %artifact.display(), error = %e, "Failed to remove empty artifact");
        }
        return Ok(ArchiveRunResult {
            pages_fetched,
            ..ArchiveRunResult::default()
        });
    }

    let (first_id, last_id) = ids
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), &id| (lo.min(id), hi.max(id)));
    let key = keys::build_key(&config.prefix, Utc::now(), first_id, last_id);

    info!(rows = ids.len(), key, "Uploading archive artifact");
    let object_url = match store.put(&artifact, &key, "text/csv").await {
        Ok(url) => url,
        Err(source) => {
            // Never delete before a confirmed upload. The artifact stays
            // on disk so an operator can inspect or retry.
            error!(
                key,
                artifact = %artifact.display(),
                error = %source,
                "Upload failed, table rows left untouched"
            );
            return Err(ArchiveError::UploadFailed {
                key,
                artifact,
                source,
            });
        }
    };

    let deleted = db.delete_by_ids(&ids, config.delete_batch).await?;
    std::fs::remove_file(&artifact)?;
    info!(deleted, url = object_url, "Archive cycle complete");

    Ok(ArchiveRunResult {
        pages_fetched,
        rows_archived: ids.len() as u64,
        key: Some(key),
        object_url: Some(object_url),
    })
}
