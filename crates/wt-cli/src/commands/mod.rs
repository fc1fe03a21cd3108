//! CLI subcommand implementations.

pub mod cleanup;
pub mod days;
pub mod export;
pub mod ingest;
pub mod report;
pub mod status;
pub mod util;
