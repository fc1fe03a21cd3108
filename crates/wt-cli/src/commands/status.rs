//! Status command for showing the current tracking session.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::SecondsFormat;
use wt_core::{AggregationStore, SessionState, SessionStore, format_duration};
use wt_db::Database;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    db_path: &Path,
    timezone: &str,
    now_ms: i64,
) -> Result<()> {
    let state = db.load_session_state()?;
    let day_count = db.load_days()?.len();
    let last_write = db.list_objects()?.into_iter().map(|o| o.updated_at).max();

    writeln!(writer, "Web time tracker status")?;
    writeln!(writer, "Database: {}", db_path.display())?;
    match last_write {
        Some(at) => writeln!(
            writer,
            "Last write: {}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?,
        None => writeln!(writer, "Last write: never")?,
    }
    writeln!(writer, "Time zone: {timezone}")?;
    write_session(writer, &state, now_ms)?;
    writeln!(writer, "Days recorded: {day_count}")?;

    Ok(())
}

fn write_session<W: Write>(writer: &mut W, state: &SessionState, now_ms: i64) -> Result<()> {
    let Some(url) = &state.active_url else {
        writeln!(writer, "Session: idle")?;
        return Ok(());
    };

    match state.elapsed_ms(now_ms) {
        Some(elapsed) => {
            let elapsed = u64::try_from(elapsed).unwrap_or(0);
            writeln!(
                writer,
                "Session: tracking {url} for {}",
                format_duration(elapsed)
            )?;
        }
        None => writeln!(writer, "Session: paused on {url}")?,
    }

    let tab = state
        .active_tab_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let window = state
        .active_window_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    let focused = if state.window_focused { "yes" } else { "no" };
    writeln!(writer, "  Tab: {tab}  Window: {window}  Focused: {focused}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use wt_core::{DayKey, TabId, WindowId};

    fn render(db: &Database, now_ms: i64) -> String {
        let mut output = Vec::new();
        run(&mut output, db, Path::new("/data/wt.db"), "UTC", now_ms).unwrap();
        String::from_utf8(output).unwrap()
    }

    /// Drops the wall-clock dependent line.
    fn without_last_write(output: &str) -> String {
        output
            .lines()
            .filter(|line| !line.starts_with("Last write:"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn status_on_empty_database_is_idle() {
        let db = Database::open_in_memory().unwrap();
        assert_snapshot!(render(&db, 0), @r"
        Web time tracker status
        Database: /data/wt.db
        Last write: never
        Time zone: UTC
        Session: idle
        Days recorded: 0
        ");
    }

    #[test]
    fn status_shows_running_session() {
        let mut db = Database::open_in_memory().unwrap();
        let day: DayKey = "2024-01-01".parse().unwrap();
        db.add_time(&day, "https://a.com/", 1_000).unwrap();
        db.save_session_state(&SessionState {
            active_tab_id: Some(TabId(10)),
            active_window_id: Some(WindowId(1)),
            active_url: Some("https://b.com/page".to_string()),
            started_at: Some(1_000_000),
            window_focused: true,
        })
        .unwrap();

        let output = render(&db, 1_000_000 + 3_725_000);
        assert!(output.contains("\nLast write: 20"));
        assert_snapshot!(without_last_write(&output), @r"
        Web time tracker status
        Database: /data/wt.db
        Time zone: UTC
        Session: tracking https://b.com/page for 01:02:05
          Tab: 10  Window: 1  Focused: yes
        Days recorded: 1
        ");
    }

    #[test]
    fn status_shows_paused_session() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_session_state(&SessionState {
            active_tab_id: Some(TabId(10)),
            active_window_id: None,
            active_url: Some("https://b.com/".to_string()),
            started_at: None,
            window_focused: false,
        })
        .unwrap();

        let output = render(&db, 5_000);
        assert!(output.contains("Session: paused on https://b.com/\n"));
        assert!(output.contains("  Tab: 10  Window: -  Focused: no\n"));
    }
}
