//! Core logic for the web time tracker.
//!
//! This crate contains:
//! - Codec: URL normalization, trackability, duration formatting
//! - Day keys: local calendar days and midnight splitting
//! - Aggregation store: per-day URL time buckets over a durable object store
//! - Tracker: the session state machine driven by browser events

mod bucket;
pub mod browser;
pub mod clock;
pub mod codec;
pub mod day;
pub mod session;
pub mod store;
mod tracker;

pub use browser::{BrowserEnvironment, BrowserEvent, BrowserSnapshot, Tab, Window};
pub use bucket::{DayBuckets, TimeBucket, export_csv, export_json};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{format_duration, is_trackable_url, normalize_url};
pub use day::{DayKey, DayKeyError, split_interval};
pub use session::{SessionState, SessionStore, TabId, WindowId};
pub use store::{AggregationStore, MemoryStore, ObjectStore, StoreError};
pub use tracker::{CloseReason, DEFAULT_RETAIN_DAYS, Tracker};
