//! Merge-fetch of course logs from the archive and the live table.
//!
//! Archive objects are scanned oldest to newest, so once every requested
//! course has produced its own deletion marker no further rows can exist
//! for any of them and the scan stops early. Rows still resident in the
//! live table are appended last, since they postdate everything archived.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    path::Path,
};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    archive::keys,
    db::{CONTEXT_COURSE, COURSE_DELETED_EVENT, DbError, LogStore},
    services::{ObjectStore, StorageError},
};

// CSV field positions in archive objects, per the log table column order.
const EVENTNAME_FIELD: usize = 1;
const CONTEXT_LEVEL_FIELD: usize = 10;
const CONTEXT_INSTANCE_FIELD: usize = 11;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Results from one reconstruction run.
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Archive objects downloaded and scanned.
    pub archives_scanned: usize,
    /// Matching rows copied out of archive objects.
    pub archive_rows: u64,
    /// Rows appended from the live table.
    pub live_rows: u64,
    /// Whether the scan stopped before exhausting the archive.
    pub stopped_early: bool,
}

/// Reconstruct the full log history for each requested course.
///
/// Writes one CSV file per course id into `log_folder`, named
/// `course_<id>_retrieved_<unix-timestamp>.csv`. A course with neither
/// archived nor live rows yields a header-only file.
pub async fn fetch_logs(
    db: &LogStore,
    store: &dyn ObjectStore,
    course_ids: &BTreeSet<i64>,
    log_folder: &Path,
) -> Result<FetchSummary, FetchError> {
    info!(courses = course_ids.len(), "Setting up course log files");
    let columns = db.columns().await?;
    let retrieved_at = Utc::now().timestamp();

    let mut sinks: BTreeMap<i64, csv::Writer<File>> = BTreeMap::new();
    for &course_id in course_ids {
        let path = log_folder.join(format!("course_{course_id}_retrieved_{retrieved_at}.csv"));
        let mut sink = csv::Writer::from_path(&path)?;
        sink.write_record(&columns)?;
        sinks.insert(course_id, sink);
    }

    let archive_keys = keys::filter_and_sort(store.list_all_keys().await?);
    info!(count = archive_keys.len(), "Scanning archive objects oldest first");

    let mut summary = FetchSummary::default();
    let mut deletion_markers = 0usize;

    'scan: for key in &archive_keys {
        let temp = tempfile::Builder::new()
            .prefix("s3logs_")
            .suffix(".csv")
            .tempfile()?;
        store.get(key, temp.path()).await?;
        summary.archives_scanned += 1;
        debug!(key, "Parsing archive object");

        // The header row never parses as a course entry, so reading
        // without headers lets positional matching skip it naturally.
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(temp.path())?;

        for record in reader.records() {
            let row = record?;
            let Some(course_id) = course_entry(&row, course_ids) else {
                continue;
            };

            if let Some(sink) = sinks.get_mut(&course_id) {
                sink.write_record(&row)?;
                summary.archive_rows += 1;
            }

            if row.get(EVENTNAME_FIELD) == Some(COURSE_DELETED_EVENT) {
                deletion_markers += 1;
                // Every requested course has reached its lifecycle end;
                // nothing newer can exist for any of them.
                if deletion_markers == course_ids.len() {
                    info!(
                        markers = deletion_markers,
                        "All requested courses deleted, stopping archive scan early"
                    );
                    summary.stopped_early = true;
                    break 'scan;
                }
            }
        }
    }

    info!("Appending rows still resident in the live table");
    for (&course_id, sink) in sinks.iter_mut() {
        for row in db.course_logs(course_id).await? {
            sink.write_record(row.to_field_vec())?;
            summary.live_rows += 1;
        }
    }

    for sink in sinks.values_mut() {
        sink.flush()?;
    }

    info!(
        archives = summary.archives_scanned,
        archive_rows = summary.archive_rows,
        live_rows = summary.live_rows,
        "Finished pulling logs"
    );
    Ok(summary)
}

/// A row belongs to a requested course when its context level is the
/// course constant and its context instance id is in the requested set.
fn course_entry(row: &csv::StringRecord, course_ids: &BTreeSet<i64>) -> Option<i64> {
    let level: i64 = row.get(CONTEXT_LEVEL_FIELD)?.parse().ok()?;
    if level != CONTEXT_COURSE {
        return None;
    }

    let course_id: i64 = row.get(CONTEXT_INSTANCE_FIELD)?.parse().ok()?;
    course_ids.contains(&course_id).then_some(course_id)
}
