//! Main application entry point (CLI binary).
//!
//! A thin wrapper around the `ad_visitor` library: parses arguments,
//! initializes the logger, runs the service, and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use ad_visitor::{init_logger_with, run_service, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let log_level = config.log_level.clone();
    let log_format = config.log_format.clone();
    init_logger_with(log_level.into(), log_format).context("Failed to initialize logger")?;

    match run_service(config).await {
        Ok(report) => {
            println!(
                "Registered {} ad{} ({} duplicates, {} rejected) in {:.1}s",
                report.registered,
                if report.registered == 1 { "" } else { "s" },
                report.duplicates,
                report.rejected,
                report.elapsed_seconds
            );
            println!(
                "Store: {} ads ({} visited, {} failed, {} skipped) in {}",
                report.total_ads,
                report.visited,
                report.failed,
                report.skipped,
                report.db_path.display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("ad_visitor error: {:#}", e);
            process::exit(1);
        }
    }
}
