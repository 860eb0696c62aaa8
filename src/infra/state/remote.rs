//! Remote-backed state store.
//!
//! Wraps a [`LocalStateStore`] used as the staging buffer. Saves go to disk
//! first and are then streamed to the object store; loads pull the remote
//! object down (when there is one) and then read it through the local store.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{ObjectStore, RemoteLocation, StateStore, StoreError};
use crate::infra::state::local::{temp_sibling, LocalStateStore};
use crate::util::blocking;

/// State store that mirrors the local snapshot to a remote object.
pub struct RemoteStateStore {
    local: LocalStateStore,
    objects: Arc<dyn ObjectStore>,
    location: RemoteLocation,
}

impl RemoteStateStore {
    /// Compose a local staging store with an object store location.
    pub fn new(local: LocalStateStore, objects: Arc<dyn ObjectStore>, location: RemoteLocation) -> Self {
        Self {
            local,
            objects,
            location,
        }
    }

    /// Remote object location.
    pub const fn location(&self) -> &RemoteLocation {
        &self.location
    }

    /// Local staging store.
    pub const fn local(&self) -> &LocalStateStore {
        &self.local
    }

    async fn download(&self) -> Result<(), StoreError> {
        let staging = self.local.path().to_path_buf();
        if let Some(parent) = staging.parent().filter(|p| !p.as_os_str().is_empty()) {
            let parent = parent.to_path_buf();
            blocking(move || fs::create_dir_all(&parent).map_err(StoreError::from)).await?;
        }
        let partial = temp_sibling(&staging);
        if let Err(e) = self.objects.get_file(&self.location, &partial).await {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        blocking(move || fs::rename(&partial, &staging).map_err(StoreError::from)).await
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), StoreError> {
        self.local.save(snapshot).await?;
        self.objects.put_file(&self.location, self.local.path()).await?;
        tracing::debug!("uploaded snapshot to {}", self.location);
        Ok(())
    }

    async fn load(&self) -> Result<Vec<u8>, StoreError> {
        if self.objects.exists(&self.location).await? {
            self.download().await?;
            tracing::info!("restored snapshot from {}", self.location);
        } else {
            tracing::info!("no remote snapshot at {}, using local state", self.location);
        }
        self.local.load().await
    }
}
