//! Ingest command: the host side of the browser event source.
//!
//! Events arrive as JSON Lines on stdin, one envelope per line:
//!
//! ```json
//! {"timestamp": 1704153598000,
//!  "event": {"type": "window_focus_changed", "window_id": 1},
//!  "browser": {"windows": [{"id": 1, "focused": true,
//!              "tabs": [{"id": 10, "windowId": 1, "url": "https://a.com/", "active": true}]}]}}
//! ```
//!
//! `browser` is the browser's state as seen when the event fired; the tracker
//! answers its tab and window lookups from it. Lines that fail to parse are
//! logged and skipped.
//!
//! Envelope and event fields are snake_case. Tab objects, both inside
//! `browser` and as the `tab` of a `tab_updated` event, keep the browser's own
//! camelCase names (`windowId`), so they can be forwarded unchanged.

use std::io::BufRead;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use wt_core::{
    BrowserEvent, BrowserSnapshot, Clock, DayKey, ManualClock, ObjectStore, SystemClock, Tracker,
};
use wt_db::Database;

use super::util::acquire_lock;
use crate::Config;

/// One browser event together with the context needed to handle it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Epoch milliseconds when the event fired. Required with `--replay`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub event: BrowserEvent,
    #[serde(default)]
    pub browser: BrowserSnapshot,
}

/// Counts from one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub handled: usize,
    pub skipped: usize,
}

/// Applies every envelope from `reader` to the configured database.
///
/// Holds an exclusive lock for the whole batch so concurrent ingests cannot
/// interleave their read-modify-write cycles.
pub fn run<R: BufRead>(reader: R, config: &Config, replay: bool) -> Result<IngestStats> {
    let lock = acquire_lock(&config.lock_path())?;

    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let stats = if replay {
        let clock = ManualClock::default();
        let mut tracker = Tracker::new(db, &clock, Local).with_retain_days(config.retain_days);
        ingest_from(&mut tracker, reader, Some(&clock))?
    } else {
        let mut tracker =
            Tracker::new(db, SystemClock, Local).with_retain_days(config.retain_days);
        ingest_from(&mut tracker, reader, None)?
    };

    FileExt::unlock(&lock).context("failed to release lock")?;
    tracing::info!(
        handled = stats.handled,
        skipped = stats.skipped,
        "ingested browser events"
    );
    Ok(stats)
}

/// Feeds envelopes to `tracker`.
///
/// With a `replay_clock`, each envelope's timestamp is applied to it before the
/// event is handled. Envelopes without a timestamp, or with one outside the
/// calendar range, are skipped.
fn ingest_from<S, C, Tz, R>(
    tracker: &mut Tracker<S, C, Tz>,
    reader: R,
    replay_clock: Option<&ManualClock>,
) -> Result<IngestStats>
where
    S: ObjectStore,
    C: Clock,
    Tz: TimeZone,
    R: BufRead,
{
    let mut stats = IngestStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.context("failed to read event line")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope: EventEnvelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(line = line_no, error = %err, "skipping malformed event");
                stats.skipped += 1;
                continue;
            }
        };

        if let Some(clock) = replay_clock {
            let Some(timestamp) = envelope.timestamp else {
                tracing::warn!(line = line_no, "skipping replayed event without timestamp");
                stats.skipped += 1;
                continue;
            };
            if DayKey::from_epoch_ms(timestamp, tracker.time_zone()).is_none() {
                tracing::warn!(
                    line = line_no,
                    timestamp,
                    "skipping replayed event with out-of-range timestamp"
                );
                stats.skipped += 1;
                continue;
            }
            clock.set(timestamp);
        }

        tracker
            .handle(&envelope.event, &envelope.browser)
            .with_context(|| format!("failed to handle event on line {line_no}"))?;
        stats.handled += 1;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use chrono::{DateTime, Utc};
    use wt_core::{AggregationStore, MemoryStore};

    fn ms(rfc3339: &str) -> i64 {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .timestamp_millis()
    }

    fn browser_json(url: &str) -> String {
        format!(
            r#"{{"windows":[{{"id":1,"focused":true,"tabs":[{{"id":10,"windowId":1,"url":"{url}","active":true}}]}}]}}"#
        )
    }

    fn replay(lines: &[String]) -> (MemoryStore, IngestStats) {
        let clock = ManualClock::default();
        let mut tracker = Tracker::new(MemoryStore::new(), &clock, Utc);
        let input = lines.join("\n");
        let stats = ingest_from(&mut tracker, Cursor::new(input), Some(&clock)).unwrap();
        (tracker.into_store(), stats)
    }

    #[test]
    fn replayed_events_record_time() {
        let lines = vec![
            format!(
                r#"{{"timestamp":{},"event":{{"type":"window_focus_changed","window_id":1}},"browser":{}}}"#,
                ms("2024-01-01T10:00:00Z"),
                browser_json("https://a.com/#intro")
            ),
            format!(
                r#"{{"timestamp":{},"event":{{"type":"window_focus_changed","window_id":null}}}}"#,
                ms("2024-01-01T10:00:42Z")
            ),
        ];
        let (store, stats) = replay(&lines);

        assert_eq!(
            stats,
            IngestStats {
                handled: 2,
                skipped: 0
            }
        );
        let day: DayKey = "2024-01-01".parse().unwrap();
        assert_eq!(
            store.get_bucket(&day).unwrap().get("https://a.com/"),
            Some(42_000)
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let lines = vec![
            "not json".to_string(),
            String::new(),
            r#"{"event":{"type":"unknown_event"}}"#.to_string(),
            format!(
                r#"{{"timestamp":{},"event":{{"type":"process_start"}}}}"#,
                ms("2024-01-01T10:00:00Z")
            ),
        ];
        let (_, stats) = replay(&lines);
        assert_eq!(
            stats,
            IngestStats {
                handled: 1,
                skipped: 2
            }
        );
    }

    #[test]
    fn replay_requires_timestamps() {
        let lines = vec![r#"{"event":{"type":"process_start"}}"#.to_string()];
        let (_, stats) = replay(&lines);
        assert_eq!(
            stats,
            IngestStats {
                handled: 0,
                skipped: 1
            }
        );
    }

    #[test]
    fn replay_skips_out_of_range_timestamps() {
        let focus_at = |timestamp: i64| {
            format!(
                r#"{{"timestamp":{timestamp},"event":{{"type":"window_focus_changed","window_id":1}},"browser":{}}}"#,
                browser_json("https://a.com/")
            )
        };
        let blur_at = |timestamp: i64| {
            format!(
                r#"{{"timestamp":{timestamp},"event":{{"type":"window_focus_changed","window_id":null}}}}"#
            )
        };
        let lines = vec![
            focus_at(-9_000_000_000_000_000_000),
            blur_at(9_000_000_000_000_000_000),
            focus_at(ms("2024-01-01T23:59:59Z")),
            blur_at(9_000_000_000_000_000_000),
            blur_at(ms("2024-01-02T00:00:01Z")),
        ];
        let (store, stats) = replay(&lines);

        assert_eq!(
            stats,
            IngestStats {
                handled: 2,
                skipped: 3
            }
        );
        let key = |s: &str| s.parse::<DayKey>().unwrap();
        assert_eq!(
            store.list_day_keys(10).unwrap(),
            vec![key("2024-01-02"), key("2024-01-01")]
        );
        assert_eq!(
            store.get_bucket(&key("2024-01-01")).unwrap().get("https://a.com/"),
            Some(1000)
        );
    }

    #[test]
    fn live_ingest_accepts_events_without_timestamps() {
        let mut tracker = Tracker::new(MemoryStore::new(), ManualClock::new(0), Utc);
        let input = format!(
            "{{\"event\":{{\"type\":\"window_focus_changed\",\"window_id\":1}},\"browser\":{}}}\n",
            browser_json("https://a.com/")
        );
        let stats = ingest_from(&mut tracker, Cursor::new(input), None).unwrap();

        assert_eq!(stats.handled, 1);
        let state = tracker.state().unwrap();
        assert_eq!(state.active_url.as_deref(), Some("https://a.com/"));
        assert_eq!(state.started_at, Some(0));
    }

    #[test]
    fn envelope_without_browser_uses_empty_snapshot() {
        let envelope: EventEnvelope =
            serde_json::from_str(r#"{"event":{"type":"tab_removed","tab_id":3}}"#).unwrap();
        assert_eq!(envelope.timestamp, None);
        assert!(envelope.browser.windows.is_empty());
    }

    #[test]
    fn run_persists_to_database() {
        let temp = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: temp.path().join("data").join("wt.db"),
            ..Config::default()
        };
        let now = Utc::now().timestamp_millis();
        let input = format!(
            "{{\"timestamp\":{now},\"event\":{{\"type\":\"window_focus_changed\",\"window_id\":1}},\"browser\":{}}}\n",
            browser_json("https://a.com/")
        );

        let stats = run(Cursor::new(input), &config, true).unwrap();
        assert_eq!(stats.handled, 1);
        assert!(config.lock_path().exists());

        let db = Database::open(&config.database_path).unwrap();
        let state = wt_core::SessionStore::load_session_state(&db).unwrap();
        assert_eq!(state.started_at, Some(now));
    }
}
