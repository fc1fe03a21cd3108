//! Per-day URL time buckets and their export formats.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::day::DayKey;

/// Accumulated milliseconds per normalized URL for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeBucket(BTreeMap<String, u64>);

impl TimeBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated time for `url`, if any was recorded.
    pub fn get(&self, url: &str) -> Option<u64> {
        self.0.get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in URL order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(url, ms)| (url.as_str(), *ms))
    }

    pub fn total_ms(&self) -> u64 {
        self.0.values().fold(0, |acc, ms| acc.saturating_add(*ms))
    }

    /// Entries with recorded time, longest first, ties broken by URL.
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().filter(|(_, ms)| *ms > 0).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub(crate) fn add(&mut self, url: &str, delta_ms: u64) {
        let entry = self.0.entry(url.to_string()).or_insert(0);
        *entry = entry.saturating_add(delta_ms);
    }
}

impl FromIterator<(String, u64)> for TimeBucket {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// All buckets, keyed by day. This is the persisted aggregation root.
pub type DayBuckets = BTreeMap<DayKey, TimeBucket>;

#[derive(Serialize)]
struct JsonExport<'a> {
    day: &'a DayKey,
    entries: &'a TimeBucket,
}

/// Renders one day as pretty-printed JSON: `{"day": ..., "entries": {...}}`.
pub fn export_json(day: &DayKey, bucket: &TimeBucket) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonExport {
        day,
        entries: bucket,
    })
}

/// Renders one day as CSV with a `day,url,ms` header.
///
/// Rows are separated by `\n` with no trailing newline.
pub fn export_csv(day: &DayKey, bucket: &TimeBucket) -> String {
    let day = day.to_string();
    let mut lines = Vec::with_capacity(bucket.len() + 1);
    lines.push("day,url,ms".to_string());
    for (url, ms) in bucket.iter() {
        lines.push(format!("{},{},{ms}", csv_escape(&day), csv_escape(url)));
    }
    lines.join("\n")
}

fn csv_escape(field: &str) -> Cow<'_, str> {
    let needs_quote = field.contains([',', '"', '\n', '\r']);
    if needs_quote {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
