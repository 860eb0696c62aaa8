//! Tests for error types and their classification

use prometheus_central_scheduler::core::{ErrorKind, SchedulerError, StoreError};
use prometheus_central_scheduler::runtime::RpcError;

#[test]
fn test_task_not_found_error() {
    let err = SchedulerError::TaskNotFound("a".to_string());
    assert_eq!(format!("{}", err), "task not found: a");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.is_caller_error());
}

#[test]
fn test_worker_mismatch_is_validation() {
    let err = SchedulerError::WorkerMismatch {
        task_id: "a".into(),
        assigned: Some("w1".into()),
        reported: "w2".into(),
    };
    assert!(err.to_string().contains("not to w2"));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.is_caller_error());
}

#[test]
fn test_store_error_conversion() {
    let err: SchedulerError = StoreError::NotFound.into();
    assert_eq!(format!("{}", err), "store error: snapshot not found");
    assert_eq!(err.kind(), ErrorKind::Store);
    assert!(!err.is_caller_error());
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: StoreError = io.into();
    assert!(matches!(err, StoreError::Io(_)));
}

#[test]
fn test_not_serving_and_corrupt_state_kinds() {
    assert_eq!(SchedulerError::NotServing.kind(), ErrorKind::Unavailable);
    assert_eq!(
        SchedulerError::CorruptState("bad".into()).kind(),
        ErrorKind::CorruptState
    );
}

#[test]
fn test_rpc_error_carries_kind_tag() {
    let rpc: RpcError = SchedulerError::Validation("empty id".into()).into();
    assert_eq!(rpc.kind, ErrorKind::Validation);
    assert_eq!(rpc.message, "validation error: empty id");
    let json = serde_json::to_value(&rpc).unwrap();
    assert_eq!(json["kind"], "validation");
}
