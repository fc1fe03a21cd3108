//! Durable object storage and the day-bucketed aggregation store.
//!
//! The tracker never talks to a database directly. It reads and writes whole
//! named JSON objects through [`ObjectStore`], which `wt-db` implements on top
//! of SQLite and [`MemoryStore`] implements in memory.
//!
//! # Persisted objects
//!
//! - [`DAY_BUCKETS_KEY`]: `{"YYYY-MM-DD": {"<url>": <ms>, ...}, ...}`
//! - [`SESSION_STATE_KEY`]: see [`SessionState`](crate::SessionState)
//!
//! An absent object reads as its empty default. A present but malformed object
//! is reported as [`StoreError::Corrupt`].

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::bucket::{DayBuckets, TimeBucket};
use crate::day::DayKey;

/// Storage key of the aggregation root.
pub const DAY_BUCKETS_KEY: &str = "day_buckets_v1";

/// Storage key of the session state record.
pub const SESSION_STATE_KEY: &str = "session_state_v1";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying storage failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A stored object could not be decoded.
    #[error("stored object {key} is malformed")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// An object could not be encoded for storage.
    #[error("failed to encode object {key}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read/write access to named JSON objects that survive process restarts.
pub trait ObjectStore {
    /// Returns the JSON text stored under `key`, or `None` if absent.
    fn read_object(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replaces the object stored under `key`.
    fn write_object(&mut self, key: &str, json: &str) -> Result<(), StoreError>;
}

/// Reads a typed object, falling back to its default when absent.
pub(crate) fn read_or_default<T, S>(store: &S, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
    S: ObjectStore + ?Sized,
{
    match store.read_object(key)? {
        Some(json) => serde_json::from_str(&json).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        }),
        None => Ok(T::default()),
    }
}

/// Writes a typed object as JSON.
pub(crate) fn write_json<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
    S: ObjectStore + ?Sized,
{
    let json = serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.write_object(key, &json)
}

/// In-process object store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn read_object(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.objects.get(key).cloned())
    }

    fn write_object(&mut self, key: &str, json: &str) -> Result<(), StoreError> {
        self.objects.insert(key.to_string(), json.to_string());
        Ok(())
    }
}

/// Day-bucketed accumulation of time per URL.
///
/// Every operation is a full read-modify-write of the aggregation root, so
/// callers must not run two of them concurrently against the same backend.
/// Implemented for every [`ObjectStore`].
pub trait AggregationStore: ObjectStore {
    /// Loads every bucket.
    fn load_days(&self) -> Result<DayBuckets, StoreError> {
        read_or_default(self, DAY_BUCKETS_KEY)
    }

    /// Adds `delta_ms` to `url` on `day`.
    ///
    /// Empty URLs and non-positive deltas are ignored. The delta must not span
    /// more than one calendar day.
    fn add_time(&mut self, day: &DayKey, url: &str, delta_ms: i64) -> Result<(), StoreError> {
        let Ok(delta_ms) = u64::try_from(delta_ms) else {
            return Ok(());
        };
        if url.is_empty() || delta_ms == 0 {
            return Ok(());
        }
        let mut days = self.load_days()?;
        days.entry(*day).or_default().add(url, delta_ms);
        write_json(self, DAY_BUCKETS_KEY, &days)
    }

    /// Deletes buckets more than `retain_days` calendar days older than `today`.
    ///
    /// Returns the removed days, oldest first.
    fn cleanup_old_days(
        &mut self,
        retain_days: u32,
        today: DayKey,
    ) -> Result<Vec<DayKey>, StoreError> {
        let mut days = self.load_days()?;
        let expired: Vec<DayKey> = days
            .keys()
            .copied()
            .filter(|day| day.days_until(today) > i64::from(retain_days))
            .collect();
        if expired.is_empty() {
            return Ok(expired);
        }
        for day in &expired {
            days.remove(day);
        }
        write_json(self, DAY_BUCKETS_KEY, &days)?;
        tracing::info!(removed = expired.len(), retain_days, "pruned old days");
        Ok(expired)
    }

    /// Days that have a bucket, most recent first, at most `limit` of them.
    fn list_day_keys(&self, limit: usize) -> Result<Vec<DayKey>, StoreError> {
        let days = self.load_days()?;
        Ok(days.into_keys().rev().take(limit).collect())
    }

    /// The bucket for `day`, or an empty one. Never creates a bucket.
    fn get_bucket(&self, day: &DayKey) -> Result<TimeBucket, StoreError> {
        let mut days = self.load_days()?;
        Ok(days.remove(day).unwrap_or_default())
    }
}

impl<S: ObjectStore + ?Sized> AggregationStore for S {}
