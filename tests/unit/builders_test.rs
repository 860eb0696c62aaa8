//! Tests for building a scheduler from configuration

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_central_scheduler::builders::{build_error_capture, build_scheduler, build_state_store};
use prometheus_central_scheduler::config::{ObjectStoreConfig, SchedulerConfig};
use prometheus_central_scheduler::core::{CallContext, ErrorReporter, SchedulerError};

fn config_in(dir: &std::path::Path) -> SchedulerConfig {
    SchedulerConfig {
        state_path: dir.join("state.json"),
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn test_build_scheduler_starts_empty_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = build_scheduler(&config_in(dir.path())).await.unwrap();
    assert!(scheduler.is_serving());
    scheduler.register("a", vec![]).unwrap();
    assert_eq!(scheduler.checkpoint().await.unwrap(), 1);
}

#[tokio::test]
async fn test_build_scheduler_restores_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    {
        let scheduler = build_scheduler(&cfg).await.unwrap();
        scheduler.register("a", vec![]).unwrap();
        scheduler.register("b", vec!["a".into()]).unwrap();
        scheduler.checkpoint().await.unwrap();
    }
    let scheduler = build_scheduler(&cfg).await.unwrap();
    assert_eq!(scheduler.counts().pending, 2);
    assert_eq!(scheduler.ready_tasks(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_build_scheduler_refuses_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(dir.path());
    std::fs::write(&cfg.state_path, b"{\"format\":\"something-else\"}").unwrap();

    let err = build_scheduler(&cfg).await.err().unwrap();
    let cause = err.downcast_ref::<SchedulerError>().unwrap();
    assert!(matches!(cause, SchedulerError::CorruptState(_)));
}

#[tokio::test]
async fn test_build_scheduler_rejects_invalid_config() {
    let cfg = SchedulerConfig {
        prune_interval_secs: 0,
        ..SchedulerConfig::default()
    };
    assert!(build_scheduler(&cfg).await.is_err());
}

#[tokio::test]
async fn test_remote_tier_selected_by_location() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SchedulerConfig {
        remote_state_path: Some("file://bucket/state.json".into()),
        object_store: ObjectStoreConfig::Filesystem {
            root: dir.path().join("remote"),
        },
        ..config_in(dir.path())
    };
    let store = build_state_store(&cfg).unwrap();
    store.save(b"x".to_vec()).await.unwrap();
    assert!(dir.path().join("remote/bucket/state.json").is_file());
}

#[derive(Default)]
struct Recording(Mutex<Vec<CallContext>>);

impl ErrorReporter for Recording {
    fn capture_exception(&self, _error: &SchedulerError, extra: &CallContext) {
        self.0.lock().push(extra.clone());
    }

    fn clear_context(&self) {}
}

#[test]
fn test_error_capture_attaches_static_context() {
    let mut cfg = SchedulerConfig::default();
    cfg.error_reporting.enabled = true;
    cfg.error_reporting
        .context
        .insert("deployment".into(), "staging".into());
    let reporter = Arc::new(Recording::default());
    let capture = build_error_capture(&cfg, reporter.clone());

    let _ = capture.run::<()>("checkpoint", CallContext::new(), || {
        Err(SchedulerError::NotServing)
    });

    let captured = reporter.0.lock();
    assert_eq!(captured[0]["deployment"], "staging");
    assert_eq!(captured[0]["operation"], "checkpoint");
}
