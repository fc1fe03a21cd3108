//! Storage layer for the web time tracker.
//!
//! Provides a durable [`ObjectStore`] using `rusqlite`. The tracker persists a
//! handful of whole JSON objects (the session state and the day buckets), so
//! the schema is a single key/value table.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Every tracker operation is a read-modify-write of a whole object, so two
//! writers sharing one database file must be serialized by the caller (the CLI
//! holds an exclusive file lock while ingesting).
//!
//! # Schema
//!
//! ```sql
//! objects(key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL)
//! ```
//!
//! `value` holds JSON text. `updated_at` is RFC 3339 UTC with millisecond
//! precision (e.g. `2024-01-15T10:30:00.000Z`).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use wt_core::{ObjectStore, StoreError};

/// How long to wait on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for object {key}: {timestamp}")]
    TimestampParse {
        key: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Metadata about one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: usize,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Named JSON objects, replaced wholesale on every write
            CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Returns the JSON text stored under `key`.
    pub fn get(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row("SELECT value FROM objects WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Stores `value` under `key`, replacing any previous object.
    pub fn put(&mut self, key: &str, value: &str) -> Result<(), DbError> {
        self.put_at(key, value, Utc::now())
    }

    fn put_at(&mut self, key: &str, value: &str, now: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO objects (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
            params![key, value, format_timestamp(now)],
        )?;
        Ok(())
    }

    /// Lists stored objects ordered by key.
    pub fn list_objects(&self) -> Result<Vec<ObjectInfo>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, length(value), updated_at FROM objects ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let size: i64 = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok((key, size, updated_at))
        })?;
        let mut objects = Vec::new();
        for row in rows {
            let (key, size, updated_at) = row?;
            let updated_at = parse_timestamp(&updated_at, &key)?;
            objects.push(ObjectInfo {
                key,
                size_bytes: usize::try_from(size).unwrap_or_default(),
                updated_at,
            });
        }
        Ok(objects)
    }
}

impl ObjectStore for Database {
    fn read_object(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.get(key)?)
    }

    fn write_object(&mut self, key: &str, json: &str) -> Result<(), StoreError> {
        Ok(self.put(key, json)?)
    }
}

fn parse_timestamp(timestamp: &str, key: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            key: key.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    use wt_core::{AggregationStore, DayKey, SessionState, SessionStore, TabId};

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");
        let mut stmt = db
            .conn
            .prepare("SELECT name FROM pragma_table_info('objects') ORDER BY cid")
            .unwrap();
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["key", "value", "updated_at"]);
    }

    #[test]
    fn missing_object_reads_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.read_object("nope").unwrap(), None);
    }

    #[test]
    fn put_replaces_previous_value() {
        let mut db = Database::open_in_memory().unwrap();
        let t1 = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let t2 = DateTime::parse_from_rfc3339("2025-01-01T00:05:00Z")
            .unwrap()
            .with_timezone(&Utc);

        db.put_at("state", r#"{"a":1}"#, t1).unwrap();
        db.put_at("state", r#"{"a":2}"#, t2).unwrap();

        assert_eq!(db.get("state").unwrap().as_deref(), Some(r#"{"a":2}"#));
        let objects = db.list_objects().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "state");
        assert_eq!(objects[0].size_bytes, 7);
        assert_eq!(objects[0].updated_at, t2);
    }

    #[test]
    fn stored_timestamps_are_millisecond_rfc3339() {
        let mut db = Database::open_in_memory().unwrap();
        let now = DateTime::parse_from_rfc3339("2025-01-29T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);
        db.put_at("k", "{}", now).unwrap();

        let raw: String = db
            .conn
            .query_row("SELECT updated_at FROM objects WHERE key = 'k'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(raw, "2025-01-29T12:00:00.123Z");
    }

    #[test]
    fn aggregation_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("wt.db");
        let day: DayKey = "2024-01-01".parse().unwrap();

        {
            let mut db = Database::open(&path).unwrap();
            db.add_time(&day, "https://a.com/", 5000).unwrap();
            db.add_time(&day, "https://a.com/", 3000).unwrap();
            db.save_session_state(&SessionState {
                active_tab_id: Some(TabId(7)),
                window_focused: true,
                ..SessionState::default()
            })
            .unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_bucket(&day).unwrap().get("https://a.com/"), Some(8000));
        let state = db.load_session_state().unwrap();
        assert_eq!(state.active_tab_id, Some(TabId(7)));
        assert!(state.window_focused);
    }

    #[test]
    fn corrupt_object_surfaces_as_store_error() {
        let mut db = Database::open_in_memory().unwrap();
        db.put("day_buckets_v1", "[1, 2").unwrap();
        let err = db.list_day_keys(10).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));

        let parsed: serde_json::Result<serde_json::Value> =
            serde_json::from_str(&db.get("day_buckets_v1").unwrap().unwrap());
        assert!(parsed.is_err());
    }
}
