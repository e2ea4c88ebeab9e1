//! The visit scheduler: a single task owning the ad store.
//!
//! One `tokio::select!` loop serializes everything that touches the store:
//! inbound commands, visit outcomes, and the periodic tick that selects the
//! next pending record. Visits run as spawned tasks but never more than one
//! at a time (single-flight); their outcomes are applied before the next
//! tick's selection runs, so selection always observes settled state.

mod service;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DEFAULT_REPEAT_VISIT_INTERVAL_MS};
use crate::dnt::DntPolicy;
use crate::error_handling::{
    ErrorType, InfoType, ProcessingStats, StorageError, VisitError, WarningType,
};
use crate::events::{event_channel, AdEvent};
use crate::interchange::{apply_import, export_snapshot};
use crate::storage::{DurableStore, PersistedState, PersistenceThrottle};
use crate::store::{build_record, internal_link_allowlist, AdCandidate, AdStore};
use crate::utils::now_ms;
use crate::visit::{validate_target, VisitExecutor, VisitOutcome};

pub use service::{AdService, RegisterOutcome, ServiceClosed};
use service::Command;

/// Scheduler tuning, derived from [`Config`].
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Base tick period
    pub poll_interval: Duration,
    /// Per-visit timeout; also the stuck-visit threshold
    pub visit_timeout: Duration,
    /// Attempt budget per record
    pub max_attempts: u32,
    /// Minimum user inactivity before visits run; zero disables gating
    pub idle_threshold: Duration,
    /// Probability a new record will ever be visited
    pub click_probability: f64,
    /// Master switch for background visiting
    pub visiting_enabled: bool,
    /// Automated/test mode: never visit
    pub automated: bool,
    /// Duplicate-suppression window in milliseconds
    pub repeat_visit_interval_ms: i64,
    /// Override for the internal-link domain allow-list
    pub internal_link_domains: Vec<String>,
}

impl From<&Config> for SchedulerOptions {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            visit_timeout: Duration::from_secs(config.visit_timeout_secs.max(1)),
            max_attempts: config.max_attempts.max(1),
            idle_threshold: Duration::from_millis(config.idle_threshold_ms),
            click_probability: config.click_probability.clamp(0.0, 1.0),
            visiting_enabled: !config.no_visits,
            automated: config.automated,
            repeat_visit_interval_ms: config
                .repeat_visit_after_ms
                .unwrap_or(DEFAULT_REPEAT_VISIT_INTERVAL_MS),
            internal_link_domains: config.internal_link_domains.clone(),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        (&Config::default()).into()
    }
}

/// Owns the scheduler task's lifecycle.
pub struct Scheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Loads and repairs the persisted store, then spawns the scheduler
    /// task. Returns the service handle and the lifecycle owner.
    pub async fn start(
        options: SchedulerOptions,
        client: Arc<reqwest::Client>,
        dnt: Arc<dyn DntPolicy>,
        durable: Arc<dyn DurableStore>,
        stats: Arc<ProcessingStats>,
    ) -> Result<(AdService, Scheduler), StorageError> {
        let mut store = match durable.load().await? {
            Some(payload) => match PersistedState::from_payload(&payload) {
                Ok(state) => state.into_store(),
                Err(e) => {
                    // a corrupt snapshot must not brick the service
                    error!("Discarding unreadable persisted store: {e}");
                    AdStore::new()
                }
            },
            None => AdStore::new(),
        };

        let report = store.validate_and_repair();
        for _ in 0..report.dropped {
            stats.increment_warning(WarningType::InvalidStoredRecord);
        }
        for _ in 0..report.rekeyed {
            stats.increment_warning(WarningType::IntegrityDrift);
        }
        for _ in 0..store.redact_private() {
            stats.increment_info(InfoType::PrivateRedacted);
        }

        let (command_tx, command_rx) = mpsc::channel(64);
        let (visit_tx, visit_rx) = mpsc::channel(8);
        let events = event_channel();
        let cancel = CancellationToken::new();

        let allowlist = internal_link_allowlist(&options.internal_link_domains);
        let executor = VisitExecutor::new(client, options.visit_timeout);
        let core = Core {
            options,
            allowlist,
            store,
            throttle: PersistenceThrottle::new(),
            durable,
            dnt,
            executor,
            events: events.clone(),
            stats,
            visit_tx,
            in_flight: None,
            inspected: None,
            last_activity: Instant::now(),
            last_user_activity: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let handle = tokio::spawn(core.run(command_rx, visit_rx, cancel.clone()));
        Ok((AdService::new(command_tx, events), Scheduler { cancel, handle }))
    }

    /// Stops the scheduler after a final durable flush.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Scheduler task ended abnormally: {e}");
        }
    }
}

struct InFlight {
    id: u64,
    started: Instant,
}

/// The scheduler task's state. Exclusively owned by `run`.
struct Core {
    options: SchedulerOptions,
    allowlist: HashSet<String>,
    store: AdStore,
    throttle: PersistenceThrottle,
    durable: Arc<dyn DurableStore>,
    dnt: Arc<dyn DntPolicy>,
    executor: VisitExecutor,
    events: broadcast::Sender<AdEvent>,
    stats: Arc<ProcessingStats>,
    visit_tx: mpsc::Sender<(u64, VisitOutcome)>,
    in_flight: Option<InFlight>,
    inspected: Option<u64>,
    last_activity: Instant,
    last_user_activity: Instant,
    version: String,
}

impl Core {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut visits: mpsc::Receiver<(u64, VisitOutcome)>,
        cancel: CancellationToken,
    ) {
        info!("[INIT] Scheduler started with {} ads", self.store.len());
        self.flush(true).await;

        // give registrations a head start before the first poll
        let mut next_tick = tokio::time::Instant::now() + self.options.poll_interval * 2;

        loop {
            tokio::select! {
                // completions must settle before the next selection runs
                biased;

                _ = cancel.cancelled() => {
                    self.flush(true).await;
                    info!("Scheduler stopped, {} ads stored", self.store.len());
                    break;
                }

                Some((id, outcome)) = visits.recv() => {
                    self.apply_outcome(id, outcome).await;
                }

                Some(command) = commands.recv() => {
                    self.handle_command(command).await;
                }

                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick().await;
                    // re-arm, self-correcting for drift without tight-looping
                    let since_activity = self.last_activity.elapsed();
                    let delay = std::cmp::max(
                        self.options.poll_interval / 2,
                        self.options.poll_interval.saturating_sub(since_activity),
                    );
                    next_tick = tokio::time::Instant::now() + delay;
                }
            }
        }
    }

    fn mark_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    fn mark_user_activity(&mut self) {
        self.last_user_activity = Instant::now();
    }

    async fn tick(&mut self) {
        self.mark_activity();

        if !self.options.visiting_enabled || self.options.automated {
            return;
        }

        if !self.options.idle_threshold.is_zero()
            && self.last_user_activity.elapsed() < self.options.idle_threshold
        {
            debug!(
                "[IDLER] {}ms since user activity, waiting for {}ms",
                self.last_user_activity.elapsed().as_millis(),
                self.options.idle_threshold.as_millis()
            );
            return;
        }

        if let Some(in_flight) = &self.in_flight {
            if in_flight.started.elapsed() > self.options.visit_timeout {
                let id = in_flight.id;
                warn!("[TIMEOUT] Forcing timeout for stuck visit of Ad#{id}");
                self.apply_outcome(id, VisitOutcome::Failure(VisitError::Timeout))
                    .await;
            } else {
                // single-flight: never start a second visit
                return;
            }
        }

        // an inspected record that is still pending takes priority
        let next = match self.inspected {
            Some(id) if self.store.is_pending(id, self.options.max_attempts) => Some(id),
            _ => self.store.next_pending(self.options.max_attempts),
        };
        if let Some(id) = next {
            self.start_visit(id).await;
        }
    }

    async fn start_visit(&mut self, id: u64) {
        let now = now_ms();
        if self.store.begin_attempt(id, now).is_none() {
            return;
        }

        // targets can rot between registration and visit; re-validate and
        // delete anything unrecoverable instead of burning retries on it
        let target_ok = match self.store.ad_by_id_mut(id) {
            Some(ad) => validate_target(ad),
            None => return,
        };
        if let Err(e) = target_ok {
            warn!("Deleting ad with unrecoverable target: {e}");
            self.stats.increment_error(ErrorType::TargetMalformed);
            self.store.delete_by_id(id);
            self.flush(true).await;
            return;
        }

        let Some(record) = self.store.ad_by_id(id).cloned() else {
            return;
        };
        let _ = self.events.send(AdEvent::Attempt(record.clone()));
        self.in_flight = Some(InFlight {
            id,
            started: Instant::now(),
        });

        let executor = self.executor.clone();
        let visit_tx = self.visit_tx.clone();
        tokio::spawn(async move {
            let outcome = executor.visit(&record).await;
            let _ = visit_tx.send((record.id, outcome)).await;
        });
    }

    async fn apply_outcome(&mut self, id: u64, outcome: VisitOutcome) {
        self.mark_activity();
        if self.in_flight.as_ref().map_or(false, |f| f.id == id) {
            self.in_flight = None;
        }

        let now = now_ms();
        match outcome {
            VisitOutcome::Success {
                title,
                resolved_url,
                parsed_target_url,
            } => {
                if title.is_none() {
                    self.stats.increment_warning(WarningType::MissingVisitTitle);
                }
                if let Some(ad) = self.store.finish_visit_success(
                    id,
                    title,
                    resolved_url,
                    parsed_target_url,
                    now,
                ) {
                    if self.inspected == Some(id) {
                        self.inspected = None;
                    }
                    let _ = self.events.send(AdEvent::Visited(ad));
                }
            }
            VisitOutcome::Failure(error) => {
                self.stats.increment_error(error.error_type());
                if let Some(ad) = self.store.finish_visit_failure(
                    id,
                    &error.to_string(),
                    self.options.max_attempts,
                    now,
                ) {
                    let _ = self.events.send(AdEvent::Visited(ad));
                }
            }
        }
        self.flush(false).await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Register { candidate, reply } => {
                self.mark_user_activity();
                let outcome = self.register(candidate).await;
                let _ = reply.send(outcome);
            }
            Command::Delete { id, reply } => {
                self.mark_user_activity();
                let deleted = self.store.delete_by_id(id).is_some();
                if deleted {
                    self.flush(true).await;
                }
                let _ = reply.send(deleted);
            }
            Command::DeleteSet { ids, reply } => {
                self.mark_user_activity();
                let deleted = self.store.delete_set(&ids);
                if deleted > 0 {
                    self.flush(true).await;
                }
                let _ = reply.send(deleted);
            }
            Command::List {
                page_url,
                current_only,
                reply,
            } => {
                let records = self
                    .store
                    .list(page_url.as_deref(), current_only)
                    .cloned()
                    .collect();
                let _ = reply.send(records);
            }
            Command::Count { page_url, reply } => {
                let _ = reply.send(self.store.count(page_url.as_deref()));
            }
            Command::PendingCount { reply } => {
                let mut count = self.store.pending_count(self.options.max_attempts);
                if count == 0 && self.in_flight.is_some() {
                    count = 1;
                }
                let _ = reply.send(count);
            }
            Command::Import {
                payload,
                replace,
                reply,
            } => {
                self.mark_user_activity();
                let report = apply_import(&mut self.store, &payload, replace, &self.version);
                if report.count > 0 {
                    // imported keys may be legacy or hand-edited; re-verify
                    self.store.validate_and_repair();
                    self.flush(true).await;
                } else {
                    self.stats.increment_error(ErrorType::ImportParseFailure);
                }
                let _ = reply.send(report);
            }
            Command::Export { sanitize, reply } => {
                let _ = reply.send(export_snapshot(&self.store, sanitize));
            }
            Command::ClearAll { reply } => {
                self.mark_user_activity();
                let cleared = self.store.clear();
                self.inspected = None;
                self.flush(true).await;
                let _ = reply.send(cleared);
            }
            Command::RedactPrivate { reply } => {
                let redacted = self.store.redact_private();
                for _ in 0..redacted {
                    self.stats.increment_info(InfoType::PrivateRedacted);
                }
                if redacted > 0 {
                    self.flush(true).await;
                }
                let _ = reply.send(redacted);
            }
            Command::Flush { reply } => {
                self.flush(true).await;
                let _ = reply.send(());
            }
            Command::NotifyUserAction => {
                self.mark_user_activity();
            }
            Command::PageLoaded { url } => {
                self.mark_user_activity();
                let existing = self.store.count(Some(&url));
                debug!("[PAGE] {url} ({existing} existing ads)");
                self.store.mark_page_loaded(&url);
            }
            Command::Inspect { id } => {
                self.mark_user_activity();
                self.inspected = id;
            }
        }
    }

    async fn register(&mut self, candidate: AdCandidate) -> RegisterOutcome {
        let now = now_ms();
        let mut record = match build_record(candidate, &self.allowlist, now, &self.version) {
            Ok(record) => record,
            Err(e) => {
                warn!("Dropping invalid candidate: {e}");
                self.stats.increment_error(ErrorType::CandidateInvalid);
                return RegisterOutcome::Rejected(e);
            }
        };

        if let Some(existing) =
            self.store
                .find_existing(&record, self.options.repeat_visit_interval_ms, now)
        {
            info!(
                "[EXISTS] {} found {} ms ago",
                existing.info(),
                now - existing.found_ts
            );
            self.stats.increment_info(InfoType::DuplicateIgnored);
            return RegisterOutcome::Duplicate(existing.clone());
        }

        if self.dnt.must_not_visit(&record) {
            record.no_visit = true;
            record.dnt_allowed = true;
            self.stats.increment_info(InfoType::PolicyBlocked);
        } else if rand::random::<f64>() > self.options.click_probability {
            record.no_visit = true;
            self.stats.increment_info(InfoType::ProbabilitySkip);
        }

        let inserted = self.store.insert(record).clone();
        info!("[FOUND] {} {}", inserted.info(), inserted.target_url);
        let _ = self.events.send(AdEvent::Detected(inserted.clone()));
        self.flush(false).await;
        RegisterOutcome::Inserted(inserted)
    }

    async fn flush(&mut self, immediate: bool) {
        if !self.throttle.should_flush(self.store.len(), immediate) {
            return;
        }
        let payload = match PersistedState::snapshot(&self.store).to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize ad store: {e}");
                self.stats.increment_error(ErrorType::StorageFlushFailure);
                return;
            }
        };
        match self.durable.save(&payload).await {
            Ok(()) => self.throttle.mark_flushed(),
            Err(e) => {
                error!("Failed to flush ad store: {e}");
                self.stats.increment_error(ErrorType::StorageFlushFailure);
            }
        }
    }
}
