//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wt_core::DayKey;

use crate::commands::export::ExportFormat;

/// Per-URL web time tracker.
///
/// Records how long each web page is the focused, active tab, bucketed by
/// local calendar day, from browser events fed to `wt ingest`.
#[derive(Debug, Parser)]
#[command(name = "wt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current tracking session.
    Status,

    /// Apply browser events read as JSON Lines from stdin.
    Ingest {
        /// Drive the clock from each event's `timestamp` instead of the system clock.
        #[arg(long)]
        replay: bool,
    },

    /// List days that have recorded time, most recent first.
    Days {
        /// Maximum number of days to list.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show time per URL for one day.
    Report {
        /// Day to show (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        day: Option<DayKey>,

        /// Only list URLs containing this text (case-insensitive).
        #[arg(long)]
        filter: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export one day's bucket as JSON or CSV.
    Export {
        /// Day to export (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        day: Option<DayKey>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to this file, or into this directory, instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete days older than the retention window.
    Cleanup {
        /// Days of history to keep. Defaults to the configured window.
        #[arg(long)]
        retain_days: Option<u32>,
    },
}
