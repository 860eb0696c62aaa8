//! Persistence capabilities the scheduler is composed with.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::core::StoreError;

/// Durable home of the scheduler snapshot, treated as an opaque blob.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist the blob, replacing the previous one atomically.
    async fn save(&self, snapshot: Vec<u8>) -> Result<(), StoreError>;

    /// Read the last persisted blob; [`StoreError::NotFound`] if none exists.
    async fn load(&self) -> Result<Vec<u8>, StoreError>;
}

/// Location of an object in a remote store: `scheme://bucket/key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteLocation {
    /// URL scheme, e.g. `s3` or `file`.
    pub scheme: String,
    /// Bucket (or container) name.
    pub bucket: String,
    /// Object key inside the bucket.
    pub key: String,
}

impl RemoteLocation {
    /// Parse `scheme://bucket/key`.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidLocation(input.to_string());
        let (scheme, rest) = input.split_once("://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        let key = key.trim_start_matches('/');
        if scheme.is_empty() || bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(invalid());
        }
        Ok(Self {
            scheme: scheme.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

/// Remote object storage client.
///
/// Implementations must publish an uploaded object only once the whole
/// source has been streamed, so readers never see a partial object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether an object exists at `location`.
    async fn exists(&self, location: &RemoteLocation) -> Result<bool, StoreError>;

    /// Stream the local file at `source` to `location`, overwriting.
    async fn put_file(&self, location: &RemoteLocation, source: &Path) -> Result<(), StoreError>;

    /// Stream the object at `location` into the local file `dest`.
    async fn get_file(&self, location: &RemoteLocation, dest: &Path) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_nested_key() {
        let loc = RemoteLocation::parse("s3://pipelines/luigi/state.json").unwrap();
        assert_eq!(loc.scheme, "s3");
        assert_eq!(loc.bucket, "pipelines");
        assert_eq!(loc.key, "luigi/state.json");
        assert_eq!(loc.to_string(), "s3://pipelines/luigi/state.json");
    }

    #[test]
    fn rejects_locations_without_key() {
        for bad in ["pipelines/state.json", "s3://pipelines", "s3://pipelines/", "://b/k", "s3:///k"] {
            assert!(RemoteLocation::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
