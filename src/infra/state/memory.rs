//! In-memory state store.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{StateStore, StoreError};

/// Keeps the last saved snapshot in memory. Useful for tests and dev.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl InMemoryStateStore {
    /// Create an empty store; `load` reports `NotFound` until the first save.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `blob`.
    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self {
            blob: Mutex::new(Some(blob)),
        }
    }

    /// Whether a snapshot has been saved.
    pub fn is_empty(&self) -> bool {
        self.blob.lock().is_none()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), StoreError> {
        *self.blob.lock() = Some(snapshot);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<u8>, StoreError> {
        self.blob.lock().clone().ok_or(StoreError::NotFound)
    }
}
