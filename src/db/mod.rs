//! Access to the live standard log table.
//!
//! The table is owned by the host application; this crate only reads pages
//! of aging rows, deletes confirmed-archived rows, and serves per-course
//! queries for log reconstruction. No schema migration is performed.

pub mod error;

use sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions};

pub use error::{DbError, DbResult};

/// Name of the standard log table.
pub const LOG_TABLE: &str = "logstore_standard_log";

/// Context level identifying course-scoped log rows.
pub const CONTEXT_COURSE: i64 = 50;

/// Event name marking the end of a course's log lifecycle. Once every
/// requested course has produced one, no later rows can exist for them.
pub const COURSE_DELETED_EVENT: &str = r"\core\event\course_deleted";

/// One row of the standard log table.
///
/// `id` is unique and monotonically assigned by the store. `other` holds
/// an opaque serialized payload the pipeline never interprets.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LogRecord {
    pub id: i64,
    pub eventname: String,
    pub component: String,
    pub action: String,
    pub target: String,
    pub objecttable: Option<String>,
    pub objectid: Option<i64>,
    pub crud: String,
    pub edulevel: i64,
    pub contextid: i64,
    pub contextlevel: i64,
    pub contextinstanceid: i64,
    pub userid: i64,
    pub courseid: i64,
    pub relateduserid: Option<i64>,
    pub anonymous: i64,
    pub other: Option<String>,
    pub timecreated: i64,
    pub origin: Option<String>,
    pub ip: Option<String>,
    pub realuserid: Option<i64>,
}

impl LogRecord {
    /// Column order of the standard log table. CSV field positions in
    /// archive objects follow this order; `eventname` is field 1,
    /// `contextlevel` field 10 and `contextinstanceid` field 11.
    pub const COLUMNS: [&'static str; 21] = [
        "id",
        "eventname",
        "component",
        "action",
        "target",
        "objecttable",
        "objectid",
        "crud",
        "edulevel",
        "contextid",
        "contextlevel",
        "contextinstanceid",
        "userid",
        "courseid",
        "relateduserid",
        "anonymous",
        "other",
        "timecreated",
        "origin",
        "ip",
        "realuserid",
    ];

    /// Serialize the record into CSV fields in [`Self::COLUMNS`] order.
    /// Absent values become empty fields.
    pub fn to_field_vec(&self) -> Vec<String> {
        fn opt_i64(v: Option<i64>) -> String {
            v.map(|n| n.to_string()).unwrap_or_default()
        }

        vec![
            self.id.to_string(),
            self.eventname.clone(),
            self.component.clone(),
            self.action.clone(),
            self.target.clone(),
            self.objecttable.clone().unwrap_or_default(),
            opt_i64(self.objectid),
            self.crud.clone(),
            self.edulevel.to_string(),
            self.contextid.to_string(),
            self.contextlevel.to_string(),
            self.contextinstanceid.to_string(),
            self.userid.to_string(),
            self.courseid.to_string(),
            opt_i64(self.relateduserid),
            self.anonymous.to_string(),
            self.other.clone().unwrap_or_default(),
            self.timecreated.to_string(),
            self.origin.clone().unwrap_or_default(),
            self.ip.clone().unwrap_or_default(),
            opt_i64(self.realuserid),
        ]
    }
}

/// Handle to the database holding the log table.
#[derive(Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at the given URL.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current column list of the log table, in table order. Used as the
    /// CSV header for archive artifacts and reconstructed course logs.
    pub async fn columns(&self) -> DbResult<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({LOG_TABLE})"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect())
    }

    /// Fetch one page of rows created at or before `threshold`, oldest
    /// first, starting at `offset`.
    ///
    /// Ties in `timecreated` are broken by id so that successive offset
    /// pages see one total order; without the tie-break a row at a page
    /// boundary could be skipped or emitted twice.
    pub async fn fetch_page(
        &self,
        threshold: i64,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRecord>(&format!(
            "SELECT * FROM {LOG_TABLE} \
             WHERE timecreated <= ? \
             ORDER BY timecreated ASC, id ASC \
             LIMIT ? OFFSET ?"
        ))
        .bind(threshold)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete exactly the given row ids, `batch` ids per statement.
    pub async fn delete_by_ids(&self, ids: &[i64], batch: usize) -> DbResult<u64> {
        if batch == 0 {
            return Err(DbError::Internal("delete batch size must be positive".into()));
        }

        let mut deleted = 0u64;
        for chunk in ids.chunks(batch) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM {LOG_TABLE} WHERE id IN ({placeholders})");

            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }

            deleted += query.execute(&self.pool).await?.rows_affected();
        }

        Ok(deleted)
    }

    /// Rows still resident in the live table for one course.
    pub async fn course_logs(&self, course_id: i64) -> DbResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRecord>(&format!(
            "SELECT * FROM {LOG_TABLE} \
             WHERE contextlevel = ? AND contextinstanceid = ? \
             ORDER BY id ASC"
        ))
        .bind(CONTEXT_COURSE)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Total row count, used by tests and operator tooling.
    pub async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {LOG_TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}
