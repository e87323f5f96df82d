//! Shared test doubles and fixtures.

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;

use crate::{
    db::{CONTEXT_COURSE, COURSE_DELETED_EVENT, LOG_TABLE, LogRecord, LogStore},
    services::{ObjectStore, Probe, StorageError},
};

/// A viewed-event row for the given course.
pub fn log_record(id: i64, timecreated: i64, course_id: i64) -> LogRecord {
    LogRecord {
        id,
        eventname: r"\core\event\course_viewed".into(),
        component: "core".into(),
        action: "viewed".into(),
        target: "course".into(),
        objecttable: None,
        objectid: None,
        crud: "r".into(),
        edulevel: 2,
        contextid: 1000 + course_id,
        contextlevel: CONTEXT_COURSE,
        contextinstanceid: course_id,
        userid: 3,
        courseid: course_id,
        relateduserid: None,
        anonymous: 0,
        other: None,
        timecreated,
        origin: Some("web".into()),
        ip: Some("192.0.2.10".into()),
        realuserid: None,
    }
}

/// A deletion-marker row ending the given course's log lifecycle.
pub fn deletion_record(id: i64, timecreated: i64, course_id: i64) -> LogRecord {
    LogRecord {
        eventname: COURSE_DELETED_EVENT.into(),
        action: "deleted".into(),
        crud: "d".into(),
        ..log_record(id, timecreated, course_id)
    }
}

/// In-memory store with the standard log table created.
///
/// A single connection keeps every query on the same `:memory:` database.
pub async fn memory_log_store() -> LogStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::query(&format!(
        "CREATE TABLE {LOG_TABLE} (
            id INTEGER PRIMARY KEY,
            eventname TEXT NOT NULL,
            component TEXT NOT NULL,
            action TEXT NOT NULL,
            target TEXT NOT NULL,
            objecttable TEXT,
            objectid INTEGER,
            crud TEXT NOT NULL,
            edulevel INTEGER NOT NULL,
            contextid INTEGER NOT NULL,
            contextlevel INTEGER NOT NULL,
            contextinstanceid INTEGER NOT NULL,
            userid INTEGER NOT NULL,
            courseid INTEGER NOT NULL,
            relateduserid INTEGER,
            anonymous INTEGER NOT NULL,
            other TEXT,
            timecreated INTEGER NOT NULL,
            origin TEXT,
            ip TEXT,
            realuserid INTEGER
        )"
    ))
    .execute(&pool)
    .await
    .unwrap();

    LogStore::new(pool)
}

/// Insert the given rows into the log table.
pub async fn seed_records(store: &LogStore, records: &[LogRecord]) {
    for r in records {
        sqlx::query(&format!(
            "INSERT INTO {LOG_TABLE} VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(r.id)
        .bind(&r.eventname)
        .bind(&r.component)
        .bind(&r.action)
        .bind(&r.target)
        .bind(&r.objecttable)
        .bind(r.objectid)
        .bind(&r.crud)
        .bind(r.edulevel)
        .bind(r.contextid)
        .bind(r.contextlevel)
        .bind(r.contextinstanceid)
        .bind(r.userid)
        .bind(r.courseid)
        .bind(r.relateduserid)
        .bind(r.anonymous)
        .bind(&r.other)
        .bind(r.timecreated)
        .bind(&r.origin)
        .bind(&r.ip)
        .bind(r.realuserid)
        .execute(store.pool())
        .await
        .unwrap();
    }
}

/// Serialize records into an archive object body, header row included.
pub fn archive_csv(records: &[LogRecord]) -> Vec<u8> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(LogRecord::COLUMNS).unwrap();
    for record in records {
        writer.write_record(record.to_field_vec()).unwrap();
    }
    writer.into_inner().map_err(|e| e.to_string()).unwrap()
}

/// In-memory [`ObjectStore`] with call counters, standing in for S3.
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_uploads: bool,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            fail_uploads: false,
            puts: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    /// A store whose uploads always fail.
    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::new()
        }
    }

    pub fn with_object(self, key: &str, body: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), body);
        self
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        local_path: &Path,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads {
            return Err(StorageError::Upload("injected upload failure".into()));
        }

        let body = std::fs::read(local_path)?;
        self.objects.lock().unwrap().insert(key.to_string(), body);
        Ok(format!("memory://{key}"))
    }

    async fn get(&self, key: &str, local_path: &Path) -> Result<(), StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let body = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Download(format!("no such key: {key}")))?;
        std::fs::write(local_path, body)?;
        Ok(())
    }

    async fn list_all_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }

    async fn test_connection(&self) -> Probe {
        Probe {
            success: true,
            details: String::new(),
        }
    }

    async fn test_permissions(&self) -> Probe {
        Probe {
            success: !self.fail_uploads,
            details: if self.fail_uploads {
                "injected upload failure".into()
            } else {
                String::new()
            },
        }
    }
}
