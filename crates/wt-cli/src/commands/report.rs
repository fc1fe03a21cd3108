//! Report command: time per URL for one day.
//!
//! The summary (total, URL count, top entry) always covers the whole day; a
//! `--filter` only narrows the listed rows.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use wt_core::{AggregationStore, DayKey, TimeBucket, format_duration};
use wt_db::Database;

use super::util::split_url;

/// One URL's time on the reported day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub url: String,
    pub host: String,
    pub path: String,
    pub ms: u64,
}

impl ReportRow {
    fn new(url: &str, ms: u64) -> Self {
        let (host, path) = split_url(url);
        Self {
            url: url.to_string(),
            host,
            path,
            ms,
        }
    }
}

/// Computed report for a single day.
#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub day: DayKey,
    pub timezone: String,
    pub total_ms: u64,
    pub url_count: usize,
    pub top: Option<ReportRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub rows: Vec<ReportRow>,
}

/// Builds the report for `day` from its bucket.
pub fn build_report(
    day: DayKey,
    bucket: &TimeBucket,
    filter: Option<&str>,
    timezone: String,
) -> DayReport {
    let ranked = bucket.ranked();
    let total_ms = ranked.iter().map(|(_, ms)| ms).sum();
    let top = ranked.first().map(|(url, ms)| ReportRow::new(url, *ms));

    let needle = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_lowercase);
    let rows = ranked
        .iter()
        .filter(|(url, _)| {
            needle
                .as_deref()
                .is_none_or(|needle| url.to_lowercase().contains(needle))
        })
        .map(|(url, ms)| ReportRow::new(url, *ms))
        .collect();

    DayReport {
        day,
        timezone,
        total_ms,
        url_count: ranked.len(),
        top,
        filter: needle,
        rows,
    }
}

/// Writes the human-readable report.
pub fn write_report<W: Write>(writer: &mut W, report: &DayReport) -> Result<()> {
    writeln!(writer, "WEB TIME: {} ({})", report.day, report.timezone)?;

    if report.url_count == 0 {
        writeln!(writer)?;
        writeln!(writer, "No time recorded for {}.", report.day)?;
        return Ok(());
    }

    writeln!(writer)?;
    writeln!(writer, "SUMMARY")?;
    writeln!(writer, "───────")?;
    writeln!(writer, "Total:  {}", format_duration(report.total_ms))?;
    writeln!(writer, "URLs:   {}", report.url_count)?;
    if let Some(top) = &report.top {
        writeln!(
            writer,
            "Top:    {}  {}{}",
            format_duration(top.ms),
            top.host,
            top.path
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "BY URL")?;
    writeln!(writer, "──────")?;
    if report.rows.is_empty() {
        if let Some(filter) = &report.filter {
            writeln!(writer, "No URLs match \"{filter}\".")?;
        }
        return Ok(());
    }

    let host_width = report
        .rows
        .iter()
        .map(|row| row.host.chars().count())
        .max()
        .unwrap_or(0);
    for row in &report.rows {
        writeln!(
            writer,
            "  {}  {:<host_width$}  {}",
            format_duration(row.ms),
            row.host,
            row.path
        )?;
    }

    Ok(())
}

/// Formats the report as pretty JSON.
pub fn format_report_json(report: &DayReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Runs the report command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    day: DayKey,
    filter: Option<&str>,
    timezone: String,
    json: bool,
) -> Result<()> {
    let bucket = db.get_bucket(&day)?;
    let report = build_report(day, &bucket, filter, timezone);

    if json {
        writeln!(writer, "{}", format_report_json(&report)?)?;
    } else {
        write_report(writer, &report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn day() -> DayKey {
        "2024-03-05".parse().unwrap()
    }

    fn bucket() -> TimeBucket {
        [
            ("https://docs.rs/serde?search=json".to_string(), 90_000),
            ("https://example.com:8080/".to_string(), 3_723_000),
            ("https://news.example.org/item/42".to_string(), 5_000),
            ("https://zero.example/".to_string(), 0),
        ]
        .into_iter()
        .collect()
    }

    fn render(report: &DayReport) -> String {
        let mut output = Vec::new();
        write_report(&mut output, report).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn report_lists_rows_by_time() {
        let report = build_report(day(), &bucket(), None, "UTC".to_string());

        assert_eq!(report.total_ms, 3_818_000);
        assert_eq!(report.url_count, 3);
        assert_snapshot!(render(&report), @r"
        WEB TIME: 2024-03-05 (UTC)

        SUMMARY
        ───────
        Total:  01:03:38
        URLs:   3
        Top:    01:02:03  example.com:8080/

        BY URL
        ──────
          01:02:03  example.com:8080  /
          00:01:30  docs.rs           /serde?search=json
          00:00:05  news.example.org  /item/42
        ");
    }

    #[test]
    fn filter_narrows_rows_but_not_summary() {
        let report = build_report(day(), &bucket(), Some("  DOCS "), "UTC".to_string());

        assert_eq!(report.total_ms, 3_818_000);
        assert_eq!(report.url_count, 3);
        assert_eq!(report.top.as_ref().unwrap().host, "example.com:8080");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].url, "https://docs.rs/serde?search=json");
    }

    #[test]
    fn filter_without_matches_says_so() {
        let report = build_report(day(), &bucket(), Some("github"), "UTC".to_string());
        let output = render(&report);
        assert!(output.ends_with("No URLs match \"github\".\n"));
    }

    #[test]
    fn empty_day_reports_nothing_recorded() {
        let report = build_report(day(), &TimeBucket::new(), None, "Europe/Berlin".to_string());
        assert_snapshot!(render(&report), @r"
        WEB TIME: 2024-03-05 (Europe/Berlin)

        No time recorded for 2024-03-05.
        ");
    }

    #[test]
    fn json_report_includes_summary_and_rows() {
        let bucket: TimeBucket = [("https://a.com/x".to_string(), 1_500)]
            .into_iter()
            .collect();
        let report = build_report(day(), &bucket, None, "UTC".to_string());

        assert_snapshot!(format_report_json(&report).unwrap(), @r#"
        {
          "day": "2024-03-05",
          "timezone": "UTC",
          "total_ms": 1500,
          "url_count": 1,
          "top": {
            "url": "https://a.com/x",
            "host": "a.com",
            "path": "/x",
            "ms": 1500
          },
          "rows": [
            {
              "url": "https://a.com/x",
              "host": "a.com",
              "path": "/x",
              "ms": 1500
            }
          ]
        }
        "#);
    }

    #[test]
    fn run_reads_bucket_from_database() {
        let mut db = Database::open_in_memory().unwrap();
        db.add_time(&day(), "https://a.com/", 61_000).unwrap();

        let mut output = Vec::new();
        run(&mut output, &db, day(), None, "UTC".to_string(), false).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("  00:01:01  a.com  /\n"));
    }
}
