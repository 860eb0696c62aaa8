//! Object store rooted in a local directory, one subdirectory per bucket.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::{ObjectStore, RemoteLocation, StoreError};
use crate::util::blocking;

/// Maps `scheme://bucket/key` to `<root>/<bucket>/<key>`.
///
/// Uploads copy into a partial file beside the target and rename it into
/// place, so a reader sees either the old object or the complete new one.
#[derive(Debug, Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
}

impl FileSystemObjectStore {
    /// Store objects under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object.
    pub fn object_path(&self, location: &RemoteLocation) -> Result<PathBuf, StoreError> {
        let key = Path::new(&location.key);
        let escapes = key
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)));
        if escapes || location.bucket.contains(['/', '\\']) || location.bucket == ".." {
            return Err(StoreError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(&location.bucket).join(key))
    }
}

fn remote_err(location: &RemoteLocation, e: &io::Error) -> StoreError {
    StoreError::Remote(format!("{location}: {e}"))
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn exists(&self, location: &RemoteLocation) -> Result<bool, StoreError> {
        let path = self.object_path(location)?;
        blocking(move || Ok(path.is_file())).await
    }

    async fn put_file(&self, location: &RemoteLocation, source: &Path) -> Result<(), StoreError> {
        let target = self.object_path(location)?;
        let source = source.to_path_buf();
        let location = location.clone();
        blocking(move || {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| remote_err(&location, &e))?;
            }
            let partial = target.with_file_name(format!(
                ".{}.partial-{}",
                target
                    .file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                uuid::Uuid::new_v4()
            ));
            let copied = fs::copy(&source, &partial).and_then(|_| fs::rename(&partial, &target));
            if let Err(e) = copied {
                let _ = fs::remove_file(&partial);
                return Err(remote_err(&location, &e));
            }
            Ok(())
        })
        .await
    }

    async fn get_file(&self, location: &RemoteLocation, dest: &Path) -> Result<(), StoreError> {
        let source = self.object_path(location)?;
        let dest = dest.to_path_buf();
        let location = location.clone();
        blocking(move || match fs::copy(&source, &dest) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(remote_err(&location, &e)),
        })
        .await
    }
}
