//! Days command: recorded days, most recent first.

use std::io::Write;

use anyhow::Result;
use wt_core::{AggregationStore, DayKey, format_duration};
use wt_db::Database;

/// Day keys to offer for browsing.
///
/// Today always comes first, even before anything has been recorded for it.
pub fn day_choices<S: AggregationStore + ?Sized>(
    store: &S,
    today: DayKey,
    limit: usize,
) -> Result<Vec<DayKey>> {
    let mut days = store.list_day_keys(limit)?;
    if !days.contains(&today) {
        days.insert(0, today);
    }
    Ok(days)
}

pub fn run<W: Write>(writer: &mut W, db: &Database, today: DayKey, limit: usize) -> Result<()> {
    let buckets = db.load_days()?;
    for day in day_choices(db, today, limit)? {
        let total = buckets.get(&day).map_or(0, |bucket| bucket.total_ms());
        let marker = if day == today { "  (today)" } else { "" };
        writeln!(writer, "{day}  {}{marker}", format_duration(total))?;
    }
    Ok(())
}
