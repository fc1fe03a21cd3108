//! Implementation of the `wt export` command.
//!
//! Renders one day's bucket as JSON or CSV and writes it to stdout, a file, or
//! a directory (as `time-tracker_<day>.<ext>`).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use wt_core::{AggregationStore, DayKey, TimeBucket, export_csv, export_json};
use wt_db::Database;

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Renders `bucket` in `format`.
pub fn render(day: &DayKey, bucket: &TimeBucket, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => export_json(day, bucket).context("failed to serialize export"),
        ExportFormat::Csv => Ok(export_csv(day, bucket)),
    }
}

/// File name used when exporting into a directory.
pub fn default_file_name(day: &DayKey, format: ExportFormat) -> String {
    format!("time-tracker_{day}.{}", format.extension())
}

/// Resolves `--output`: a directory gets the default file name appended.
fn output_path(output: &Path, day: &DayKey, format: ExportFormat) -> PathBuf {
    if output.is_dir() {
        output.join(default_file_name(day, format))
    } else {
        output.to_path_buf()
    }
}

/// Runs the export command.
///
/// Returns the path written, or `None` when the export went to `writer`.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    day: DayKey,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let bucket = db.get_bucket(&day)?;
    let rendered = render(&day, &bucket, format)?;

    let Some(output) = output else {
        writeln!(writer, "{rendered}")?;
        return Ok(None);
    };

    let path = output_path(output, &day, format);
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), entries = bucket.len(), "exported day");
    Ok(Some(path))
}
