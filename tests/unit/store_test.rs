//! Tests for state store and object store backends

use std::sync::Arc;

use prometheus_central_scheduler::core::{ObjectStore, RemoteLocation, StateStore, StoreError};
use prometheus_central_scheduler::infra::{
    FileSystemObjectStore, InMemoryObjectStore, InMemoryStateStore, LocalStateStore,
    RemoteStateStore,
};

fn location() -> RemoteLocation {
    RemoteLocation::parse("mem://pipelines/scheduler/state.json").unwrap()
}

#[tokio::test]
async fn test_in_memory_state_store() {
    let store = InMemoryStateStore::new();
    assert!(matches!(store.load().await, Err(StoreError::NotFound)));
    store.save(b"v1".to_vec()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), b"v1");
    assert!(!store.is_empty());
}

#[tokio::test]
async fn test_local_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStateStore::new(dir.path().join("state.json"));
    store.save(b"{\"tasks\":[]}".to_vec()).await.unwrap();
    assert_eq!(store.load().await.unwrap(), b"{\"tasks\":[]}");
}

#[tokio::test]
async fn test_remote_save_uploads_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let objects = Arc::new(InMemoryObjectStore::new());
    let store = RemoteStateStore::new(
        LocalStateStore::new(dir.path().join("state.json")),
        objects.clone(),
        location(),
    );

    store.save(b"snapshot".to_vec()).await.unwrap();

    assert_eq!(objects.object(&location()).unwrap(), b"snapshot");
    assert_eq!(std::fs::read(dir.path().join("state.json")).unwrap(), b"snapshot");
}

#[tokio::test]
async fn test_remote_load_falls_back_to_local_when_object_absent() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStateStore::new(dir.path().join("state.json"));
    local.save(b"from a previous run".to_vec()).await.unwrap();

    let store = RemoteStateStore::new(local, Arc::new(InMemoryObjectStore::new()), location());
    assert_eq!(store.load().await.unwrap(), b"from a previous run");
}

#[tokio::test]
async fn test_remote_load_with_nothing_anywhere_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = RemoteStateStore::new(
        LocalStateStore::new(dir.path().join("state.json")),
        Arc::new(InMemoryObjectStore::new()),
        location(),
    );
    assert!(matches!(store.load().await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn test_remote_object_wins_over_stale_local_copy() {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStateStore::new(dir.path().join("state.json"));
    local.save(b"stale".to_vec()).await.unwrap();
    let objects = Arc::new(InMemoryObjectStore::new());
    objects.insert(location(), b"fresh".to_vec());

    let store = RemoteStateStore::new(local, objects, location());
    assert_eq!(store.load().await.unwrap(), b"fresh");
    assert_eq!(std::fs::read(dir.path().join("state.json")).unwrap(), b"fresh");
}

#[tokio::test]
async fn test_filesystem_bucket_restores_on_a_new_host() {
    let remote_root = tempfile::tempdir().unwrap();
    let loc = RemoteLocation::parse("file://sched/state.json").unwrap();

    let first_host = tempfile::tempdir().unwrap();
    let writer = RemoteStateStore::new(
        LocalStateStore::new(first_host.path().join("state.json")),
        Arc::new(FileSystemObjectStore::new(remote_root.path())),
        loc.clone(),
    );
    writer.save(b"durable".to_vec()).await.unwrap();

    let second_host = tempfile::tempdir().unwrap();
    let reader = RemoteStateStore::new(
        LocalStateStore::new(second_host.path().join("cache/state.json")),
        Arc::new(FileSystemObjectStore::new(remote_root.path())),
        loc,
    );
    assert_eq!(reader.load().await.unwrap(), b"durable");
}

#[tokio::test]
async fn test_in_memory_object_store_exists() {
    let objects = InMemoryObjectStore::new();
    assert!(!objects.exists(&location()).await.unwrap());
    objects.insert(location(), Vec::new());
    assert!(objects.exists(&location()).await.unwrap());
    assert_eq!(objects.len(), 1);
}
