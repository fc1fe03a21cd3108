use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wt_cli::commands::{cleanup, days, export, ingest, report, status, util};
use wt_cli::{Cli, Commands, Config};
use wt_core::{Clock, SystemClock};
use wt_db::Database;

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = load_config(config_path)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init: a subscriber may already be installed (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(
                &mut out,
                &db,
                &config.database_path,
                &util::local_timezone_name(),
                SystemClock.now_ms(),
            )?;
        }
        Some(Commands::Ingest { replay }) => {
            let config = load_config(cli.config.as_deref())?;
            let stats = ingest::run(io::stdin().lock(), &config, *replay)?;
            if stats.skipped > 0 {
                writeln!(
                    out,
                    "Handled {} event(s), skipped {}.",
                    stats.handled, stats.skipped
                )?;
            }
        }
        Some(Commands::Days { limit }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let limit = limit.unwrap_or(config.day_list_limit);
            days::run(&mut out, &db, util::today(), limit)?;
        }
        Some(Commands::Report { day, filter, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            report::run(
                &mut out,
                &db,
                day.unwrap_or_else(util::today),
                filter.as_deref(),
                util::local_timezone_name(),
                *json,
            )?;
        }
        Some(Commands::Export {
            day,
            format,
            output,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let day = day.unwrap_or_else(util::today);
            if let Some(path) = export::run(&mut out, &db, day, *format, output.as_deref())? {
                writeln!(out, "Exported {day} to {}", path.display())?;
            }
        }
        Some(Commands::Cleanup { retain_days }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let _lock = util::acquire_lock(&config.lock_path())?;
            let retain_days = retain_days.unwrap_or(config.retain_days);
            cleanup::run(&mut out, &mut db, util::today(), retain_days)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
