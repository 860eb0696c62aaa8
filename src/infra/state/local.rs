//! Local-disk state store.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::{StateStore, StoreError};
use crate::util::blocking;

/// Snapshot kept at a fixed path and replaced atomically on save.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    /// Store the snapshot at `path`. Parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `bytes` next to `path` and rename over it, so a crash mid-write
    /// leaves the previous snapshot intact.
    pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = temp_sibling(path);
        let written = File::create(&temp_path).and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    pub(crate) fn read(path: &Path) -> Result<Vec<u8>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

/// Unique temp file in the same directory as `path`.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "state".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()))
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path.clone();
        let len = snapshot.len();
        blocking(move || Self::write_atomic(&path, &snapshot)).await?;
        tracing::debug!("saved {} bytes to {}", len, self.path.display());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<u8>, StoreError> {
        let path = self.path.clone();
        blocking(move || Self::read(&path)).await
    }
}
