//! Durable persistence for the ad store.
//!
//! The core treats persistence as an external durable map: one payload
//! under one key. [`SqliteStore`] is the production backend;
//! [`MemoryStore`] backs tests and ephemeral runs.

mod memory;
mod sqlite;
mod state;
mod throttle;

use async_trait::async_trait;

use crate::error_handling::StorageError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use state::PersistedState;
pub use throttle::PersistenceThrottle;

/// Abstract durable key/value persistence.
///
/// Implementations only ever see an opaque serialized payload; layout and
/// upgrade concerns live in [`PersistedState`].
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Loads the persisted payload, `None` on first run.
    async fn load(&self) -> Result<Option<String>, StorageError>;

    /// Durably replaces the persisted payload.
    async fn save(&self, payload: &str) -> Result<(), StorageError>;
}
