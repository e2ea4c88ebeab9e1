//! The cloneable service handle.
//!
//! Collaborators never touch the store directly: every operation is a
//! command serialized onto the scheduler task's queue, preserving store
//! consistency without locks. Replies come back over per-call oneshot
//! channels.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error_handling::ValidationError;
use crate::events::AdEvent;
use crate::interchange::ImportReport;
use crate::store::{AdCandidate, AdRecord};

/// The scheduler task has stopped and can no longer accept operations.
#[derive(Debug, Error)]
#[error("ad service is no longer running")]
pub struct ServiceClosed;

/// How a registration resolved.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// A new record was created
    Inserted(AdRecord),
    /// An identical ad is already stored; the existing record is returned
    /// unmodified
    Duplicate(AdRecord),
    /// The candidate failed validation and was dropped
    Rejected(ValidationError),
}

#[derive(Debug)]
pub(crate) enum Command {
    Register {
        candidate: AdCandidate,
        reply: oneshot::Sender<RegisterOutcome>,
    },
    Delete {
        id: u64,
        reply: oneshot::Sender<bool>,
    },
    DeleteSet {
        ids: Vec<u64>,
        reply: oneshot::Sender<usize>,
    },
    List {
        page_url: Option<String>,
        current_only: bool,
        reply: oneshot::Sender<Vec<AdRecord>>,
    },
    Count {
        page_url: Option<String>,
        reply: oneshot::Sender<usize>,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
    Import {
        payload: Value,
        replace: bool,
        reply: oneshot::Sender<ImportReport>,
    },
    Export {
        sanitize: bool,
        reply: oneshot::Sender<String>,
    },
    ClearAll {
        reply: oneshot::Sender<usize>,
    },
    RedactPrivate {
        reply: oneshot::Sender<usize>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
    NotifyUserAction,
    PageLoaded {
        url: String,
    },
    Inspect {
        id: Option<u64>,
    },
}

/// Handle to the running ad service.
///
/// Cheap to clone; all clones feed the same scheduler task.
#[derive(Clone)]
pub struct AdService {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<AdEvent>,
}

impl AdService {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        events: broadcast::Sender<AdEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Subscribes to ad lifecycle notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AdEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceClosed> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ServiceClosed)?;
        rx.await.map_err(|_| ServiceClosed)
    }

    async fn notify(&self, command: Command) -> Result<(), ServiceClosed> {
        self.commands.send(command).await.map_err(|_| ServiceClosed)
    }

    /// Registers an ad candidate from the detector.
    pub async fn register_candidate(
        &self,
        candidate: AdCandidate,
    ) -> Result<RegisterOutcome, ServiceClosed> {
        self.request(|reply| Command::Register { candidate, reply })
            .await
    }

    /// Deletes one record by id.
    pub async fn delete(&self, id: u64) -> Result<bool, ServiceClosed> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    /// Deletes a set of records, returning how many existed.
    pub async fn delete_set(&self, ids: Vec<u64>) -> Result<usize, ServiceClosed> {
        self.request(|reply| Command::DeleteSet { ids, reply }).await
    }

    /// Lists records, optionally restricted to one page and its most
    /// recent load.
    pub async fn list(
        &self,
        page_url: Option<String>,
        current_only: bool,
    ) -> Result<Vec<AdRecord>, ServiceClosed> {
        self.request(|reply| Command::List {
            page_url,
            current_only,
            reply,
        })
        .await
    }

    /// Counts records, optionally restricted to one page.
    pub async fn count(&self, page_url: Option<String>) -> Result<usize, ServiceClosed> {
        self.request(|reply| Command::Count { page_url, reply }).await
    }

    /// Counts records still eligible for a visit, including one in flight.
    pub async fn pending_count(&self) -> Result<usize, ServiceClosed> {
        self.request(|reply| Command::PendingCount { reply }).await
    }

    /// Imports a payload in any accepted format. See
    /// [`crate::interchange::apply_import`].
    pub async fn import(
        &self,
        payload: Value,
        replace: bool,
    ) -> Result<ImportReport, ServiceClosed> {
        self.request(|reply| Command::Import {
            payload,
            replace,
            reply,
        })
        .await
    }

    /// Exports a serialized snapshot of the store.
    pub async fn export(&self, sanitize: bool) -> Result<String, ServiceClosed> {
        self.request(|reply| Command::Export { sanitize, reply }).await
    }

    /// Clears the store, the user-visited set, and the id generator.
    pub async fn clear_all(&self) -> Result<usize, ServiceClosed> {
        self.request(|reply| Command::ClearAll { reply }).await
    }

    /// Redacts and relocates private-context records.
    pub async fn redact_private(&self) -> Result<usize, ServiceClosed> {
        self.request(|reply| Command::RedactPrivate { reply }).await
    }

    /// Forces a durable flush of the store.
    pub async fn flush(&self) -> Result<(), ServiceClosed> {
        self.request(|reply| Command::Flush { reply }).await
    }

    /// Resets the user-activity idle timer.
    pub async fn notify_user_action(&self) -> Result<(), ServiceClosed> {
        self.notify(Command::NotifyUserAction).await
    }

    /// Records a top-level page load by the user.
    pub async fn page_loaded(&self, url: impl Into<String>) -> Result<(), ServiceClosed> {
        self.notify(Command::PageLoaded { url: url.into() }).await
    }

    /// Marks the record currently shown in a UI; it is visited first while
    /// pending. Pass `None` to clear.
    pub async fn inspect(&self, id: Option<u64>) -> Result<(), ServiceClosed> {
        self.notify(Command::Inspect { id }).await
    }
}
