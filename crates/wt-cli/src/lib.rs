//! Web time tracker CLI library.
//!
//! This crate provides the `wt` command-line interface: the event-source host
//! (`wt ingest`) and the read-side views over the day buckets.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
