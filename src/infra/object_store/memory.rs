//! In-memory object store.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{ObjectStore, RemoteLocation, StoreError};
use crate::util::blocking;

/// Objects held in a map keyed by location. An upload becomes visible only
/// after the source file has been read completely.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<RemoteLocation, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes stored at `location`.
    pub fn object(&self, location: &RemoteLocation) -> Option<Vec<u8>> {
        self.objects.lock().get(location).cloned()
    }

    /// Place an object directly.
    pub fn insert(&self, location: RemoteLocation, bytes: Vec<u8>) {
        self.objects.lock().insert(location, bytes);
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, location: &RemoteLocation) -> Result<bool, StoreError> {
        Ok(self.objects.lock().contains_key(location))
    }

    async fn put_file(&self, location: &RemoteLocation, source: &Path) -> Result<(), StoreError> {
        let source = source.to_path_buf();
        let bytes = blocking(move || fs::read(&source).map_err(StoreError::from)).await?;
        self.insert(location.clone(), bytes);
        Ok(())
    }

    async fn get_file(&self, location: &RemoteLocation, dest: &Path) -> Result<(), StoreError> {
        let bytes = self.object(location).ok_or(StoreError::NotFound)?;
        let dest = dest.to_path_buf();
        blocking(move || fs::write(&dest, bytes).map_err(StoreError::from)).await
    }
}
