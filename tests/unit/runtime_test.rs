//! Tests for the worker-facing RPC handler

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus_central_scheduler::core::{
    CallContext, ErrorCapture, ErrorKind, ErrorReporter, Scheduler, SchedulerError,
    SchedulerPolicy, TaskHistory, TaskStatus,
};
use prometheus_central_scheduler::infra::InMemoryStateStore;
use prometheus_central_scheduler::runtime::{
    RegisterRequest, ReportRequest, RpcHandler, WorkRequest, WorkResponse,
};

#[derive(Default)]
struct Recording {
    captured: Mutex<Vec<(ErrorKind, CallContext)>>,
    clears: Mutex<usize>,
}

impl ErrorReporter for Recording {
    fn capture_exception(&self, error: &SchedulerError, extra: &CallContext) {
        self.captured.lock().push((error.kind(), extra.clone()));
    }

    fn clear_context(&self) {
        *self.clears.lock() += 1;
    }
}

fn handler(reporter: Arc<Recording>, max_retries: u32) -> RpcHandler {
    let scheduler = Scheduler::new(
        SchedulerPolicy::default().with_max_retries(max_retries),
        Arc::new(InMemoryStateStore::new()),
        TaskHistory::in_memory(),
    );
    RpcHandler::new(Arc::new(scheduler), ErrorCapture::new(reporter, true))
}

fn register(task_id: &str, deps: &[&str]) -> RegisterRequest {
    RegisterRequest {
        task_id: task_id.into(),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        worker_id: Some("w1".into()),
    }
}

#[tokio::test]
async fn test_calls_before_bootstrap_are_unavailable_and_reported() {
    let reporter = Arc::new(Recording::default());
    let rpc = handler(reporter.clone(), 3);

    let err = rpc.register(register("a", &[])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unavailable);

    let captured = reporter.captured.lock();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].1["task_id"], "a");
    assert_eq!(captured[0].1["worker_id"], "w1");
    assert_eq!(captured[0].1["operation"], "register");
}

#[tokio::test]
async fn test_full_flow_through_handler() {
    let reporter = Arc::new(Recording::default());
    let rpc = handler(reporter.clone(), 3);
    rpc.scheduler().bootstrap().await.unwrap();

    rpc.register(register("a", &[])).unwrap();
    let b = rpc.register(register("b", &["a"])).unwrap();
    assert_eq!(b.status, TaskStatus::Pending);

    let work = rpc.request_work(&WorkRequest { worker_id: "w1".into() }).unwrap();
    assert_eq!(work, WorkResponse { task_id: Some("a".into()) });

    let done = rpc
        .report_done(&ReportRequest { task_id: "a".into(), worker_id: "w1".into() })
        .unwrap();
    assert_eq!(done.unblocked, vec!["b".to_string()]);

    assert_eq!(rpc.task_list(TaskStatus::Done).len(), 1);
    assert_eq!(rpc.history("a", None).len(), 3);
    assert!(reporter.captured.lock().is_empty());
    assert!(*reporter.clears.lock() >= 4);

    let health = rpc.health();
    assert!(health.ok);
    assert_eq!(health.counts.pending, 1);
    assert_eq!(health.counts.done, 1);
}

#[tokio::test]
async fn test_worker_mismatch_is_returned_not_reported() {
    let reporter = Arc::new(Recording::default());
    let rpc = handler(reporter.clone(), 3);
    rpc.scheduler().bootstrap().await.unwrap();
    rpc.register(register("a", &[])).unwrap();
    rpc.request_work(&WorkRequest { worker_id: "w1".into() }).unwrap();

    let err = rpc
        .report_done(&ReportRequest { task_id: "a".into(), worker_id: "w2".into() })
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(reporter.captured.lock().is_empty());
    assert_eq!(rpc.task_status("a").unwrap().status, TaskStatus::Running);
}

#[tokio::test]
async fn test_report_failed_marks_exhaustion() {
    let rpc = handler(Arc::new(Recording::default()), 1);
    rpc.scheduler().bootstrap().await.unwrap();
    rpc.register(register("a", &[])).unwrap();
    let report = ReportRequest { task_id: "a".into(), worker_id: "w1".into() };

    rpc.request_work(&WorkRequest { worker_id: "w1".into() }).unwrap();
    let first = rpc.report_failed(&report).unwrap();
    assert_eq!(first.status, TaskStatus::Pending);
    assert!(!first.exhausted);

    rpc.request_work(&WorkRequest { worker_id: "w1".into() }).unwrap();
    let second = rpc.report_failed(&report).unwrap();
    assert_eq!(second.status, TaskStatus::Failed);
    assert!(second.exhausted);
    assert!(rpc.task_status("a").unwrap().exhausted);
}

#[tokio::test]
async fn test_disable_and_unknown_task() {
    let rpc = handler(Arc::new(Recording::default()), 3);
    rpc.scheduler().bootstrap().await.unwrap();
    rpc.register(register("a", &[])).unwrap();

    rpc.disable("a").unwrap();
    assert_eq!(rpc.task_status("a").unwrap().status, TaskStatus::Disabled);
    assert_eq!(rpc.disable("a").unwrap_err().kind, ErrorKind::Validation);
    assert_eq!(rpc.task_status("zzz").unwrap_err().kind, ErrorKind::NotFound);
    assert_eq!(rpc.ping("").unwrap_err().kind, ErrorKind::Validation);
}
