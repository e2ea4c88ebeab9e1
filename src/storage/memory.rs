//! In-memory durable-store stand-in for tests and ephemeral runs.

use std::sync::Mutex;

use async_trait::async_trait;

use super::DurableStore;
use crate::error_handling::StorageError;

/// Keeps the payload in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    payload: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a payload, as if a previous run had
    /// persisted it.
    pub fn with_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Mutex::new(Some(payload.into())),
        }
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self) -> Result<Option<String>, StorageError> {
        let guard = self.payload.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    async fn save(&self, payload: &str) -> Result<(), StorageError> {
        let mut guard = self.payload.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(payload.to_string());
        Ok(())
    }
}
