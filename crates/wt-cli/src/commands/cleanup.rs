//! Cleanup command: prune days outside the retention window.

use std::io::Write;

use anyhow::Result;
use wt_core::{AggregationStore, DayKey};
use wt_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    today: DayKey,
    retain_days: u32,
) -> Result<()> {
    let removed = db.cleanup_old_days(retain_days, today)?;

    if removed.is_empty() {
        writeln!(writer, "Nothing to prune (keeping {retain_days} days).")?;
        return Ok(());
    }

    writeln!(writer, "Pruned {} day(s):", removed.len())?;
    for day in removed {
        writeln!(writer, "- {day}")?;
    }
    Ok(())
}
