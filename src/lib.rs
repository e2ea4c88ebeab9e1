//! ad_visitor library: ad registration and background visiting.
//!
//! This library discovers nothing itself: an external detector hands it ad
//! candidates, and it stores them deduplicated by page and content
//! fingerprint, then autonomously schedules background visits to their
//! target links while respecting retry limits, user-activity idling, and
//! do-not-track policy.
//!
//! # Example
//!
//! ```no_run
//! use ad_visitor::{run_service, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     candidates: Some(std::path::PathBuf::from("candidates.jsonl")),
//!     ..Default::default()
//! };
//!
//! let report = run_service(config).await?;
//! println!("{} ads stored, {} visited", report.total_ads, report.visited);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod config;
mod dnt;
mod error_handling;
mod events;
mod fingerprint;
mod initialization;
mod interchange;
mod scheduler;
mod storage;
mod store;
mod utils;
mod visit;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use dnt::{AllowAll, DntPolicy, DomainListPolicy};
pub use error_handling::{
    ErrorType, InfoType, InitializationError, ProcessingStats, StorageError, ValidationError,
    VisitError, WarningType,
};
pub use events::AdEvent;
pub use initialization::{init_client, init_logger_with};
pub use interchange::ImportReport;
pub use run::{run_service, ServiceReport};
pub use scheduler::{AdService, RegisterOutcome, Scheduler, SchedulerOptions, ServiceClosed};
pub use storage::{DurableStore, MemoryStore, SqliteStore};
pub use store::{AdCandidate, AdRecord, AdStore, ContentType};

// Internal run module (wires the service together for the CLI)
mod run {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use log::{info, warn};
    use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

    use crate::config::Config;
    use crate::dnt::{AllowAll, DntPolicy, DomainListPolicy};
    use crate::error_handling::ProcessingStats;
    use crate::initialization::init_client;
    use crate::scheduler::{AdService, RegisterOutcome, Scheduler, SchedulerOptions};
    use crate::storage::SqliteStore;
    use crate::store::AdCandidate;

    /// Results of a service run.
    #[derive(Debug, Clone)]
    pub struct ServiceReport {
        /// Candidates registered as new records
        pub registered: usize,
        /// Candidates suppressed as duplicates
        pub duplicates: usize,
        /// Candidates dropped by validation
        pub rejected: usize,
        /// Records in the store at shutdown
        pub total_ads: usize,
        /// Records successfully visited
        pub visited: usize,
        /// Records terminally failed
        pub failed: usize,
        /// Records excluded from visiting (policy, probability, user click)
        pub skipped: usize,
        /// Path to the SQLite database holding the store
        pub db_path: PathBuf,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Runs the ad service with the provided configuration.
    ///
    /// Loads the persisted store, optionally imports a file, registers the
    /// candidate stream, and drives the visit scheduler until every
    /// eligible record has resolved (or until Ctrl-C with `--watch`).
    ///
    /// # Errors
    ///
    /// Returns an error if the input file cannot be opened, the database
    /// cannot be initialized, or the HTTP client cannot be built.
    pub async fn run_service(config: Config) -> Result<ServiceReport> {
        let start_time = std::time::Instant::now();
        let stats = Arc::new(ProcessingStats::new());

        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        let durable = Arc::new(
            SqliteStore::connect(&config.db_path)
                .await
                .context("Failed to initialize database")?,
        );
        let dnt: Arc<dyn DntPolicy> = if config.dnt_domains.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(DomainListPolicy::new(config.dnt_domains.clone()))
        };

        let options = SchedulerOptions::from(&config);
        let visits_enabled = options.visiting_enabled && !options.automated;
        let poll_interval = options.poll_interval;
        let (service, scheduler) =
            Scheduler::start(options, client, dnt, durable, Arc::clone(&stats))
                .await
                .context("Failed to start scheduler")?;

        if let Some(path) = &config.import {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read import file {}", path.display()))?;
            let payload: serde_json::Value =
                serde_json::from_str(&raw).context("Import file is not valid JSON")?;
            let report = service.import(payload, false).await?;
            info!("[IMPORT] {} ads from {}", report.count, path.display());
        }

        let (registered, duplicates, rejected) =
            register_candidates(&config, &service).await?;

        if let Some(path) = &config.export {
            let snapshot = service.export(config.sanitize).await?;
            tokio::fs::write(path, snapshot)
                .await
                .with_context(|| format!("Failed to write export file {}", path.display()))?;
            info!("[EXPORT] Store written to {}", path.display());
        }

        if config.watch {
            info!("Watching; press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
        } else if visits_enabled {
            await_quiescence(&service, poll_interval).await?;
        }

        let records = service.list(None, false).await?;
        let report = ServiceReport {
            registered,
            duplicates,
            rejected,
            total_ads: records.len(),
            visited: records.iter().filter(|ad| ad.visited_ts > 0).count(),
            failed: records
                .iter()
                .filter(|ad| ad.visited_ts < 0 && ad.attempts >= config.max_attempts)
                .count(),
            skipped: records
                .iter()
                .filter(|ad| ad.no_visit || ad.dnt_allowed)
                .count(),
            db_path: config.db_path.clone(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };

        scheduler.shutdown().await;
        stats.log_summary();
        Ok(report)
    }

    /// Registers the candidate stream, line by line.
    async fn register_candidates(
        config: &Config,
        service: &AdService,
    ) -> Result<(usize, usize, usize)> {
        let Some(path) = &config.candidates else {
            return Ok((0, 0, 0));
        };

        let reader: Box<dyn AsyncBufRead + Unpin> = if path.as_os_str() == "-" {
            info!("Reading candidates from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        } else {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open candidates file {}", path.display()))?;
            Box::new(BufReader::new(file))
        };

        let mut registered = 0usize;
        let mut duplicates = 0usize;
        let mut rejected = 0usize;

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let candidate: AdCandidate = match serde_json::from_str(trimmed) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!("Skipping malformed candidate line: {e}");
                    rejected += 1;
                    continue;
                }
            };
            match service.register_candidate(candidate).await? {
                RegisterOutcome::Inserted(_) => registered += 1,
                RegisterOutcome::Duplicate(_) => duplicates += 1,
                RegisterOutcome::Rejected(_) => rejected += 1,
            }
        }

        info!("Registered {registered} ads ({duplicates} duplicates, {rejected} rejected)");
        Ok((registered, duplicates, rejected))
    }

    /// Waits until no record is pending and no visit is in flight.
    async fn await_quiescence(service: &AdService, poll_interval: Duration) -> Result<()> {
        let check_interval = std::cmp::max(poll_interval / 2, Duration::from_millis(250));
        loop {
            let pending = service.pending_count().await?;
            if pending == 0 {
                return Ok(());
            }
            log::debug!("{pending} visits still pending");
            tokio::time::sleep(check_interval).await;
        }
    }
}
