//! Worker-facing request/response models and the handler that serves them.
//!
//! The transport is out of scope: an RPC layer decodes a request, calls the
//! matching [`RpcHandler`] method and encodes the result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    CallContext, ErrorCapture, ErrorKind, HistoryEntry, Scheduler, SchedulerError,
    TaskCounts, TaskId, TaskRecord, TaskStatus, WorkerId,
};

/// Register a task with its ordered dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Task identifier.
    pub task_id: TaskId,
    /// Dependency ids.
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Registering worker; refreshes its liveness when present.
    #[serde(default)]
    pub worker_id: Option<WorkerId>,
}

/// Ask for one ready task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRequest {
    /// Requesting worker.
    pub worker_id: WorkerId,
}

/// Assigned task, or none when nothing is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkResponse {
    /// Assigned task id.
    pub task_id: Option<TaskId>,
}

/// Report the outcome of an assigned task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    /// Task identifier.
    pub task_id: TaskId,
    /// Worker that ran it.
    pub worker_id: WorkerId,
}

/// Task status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Worker holding the task while RUNNING.
    pub worker_id: Option<WorkerId>,
    /// Retries consumed.
    pub retry_count: u32,
    /// True once a FAILED task has used its whole retry budget.
    pub exhausted: bool,
}

impl TaskStatusResponse {
    fn from_record(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id.clone(),
            status: record.status,
            worker_id: record.worker.clone(),
            retry_count: record.retry_count,
            exhausted: record.is_exhausted(),
        }
    }
}

/// Outcome of `report_done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneResponse {
    /// Dependents that became ready.
    pub unblocked: Vec<TaskId>,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Serving and the last checkpoint succeeded.
    pub ok: bool,
    /// Bootstrap finished.
    pub serving: bool,
    /// Per-status task counts.
    pub counts: TaskCounts,
    /// Consecutive failed checkpoints.
    pub checkpoint_failures: u32,
}

/// Structured error returned to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl From<SchedulerError> for RpcError {
    fn from(e: SchedulerError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

fn call_context(task_id: Option<&str>, worker_id: Option<&str>) -> CallContext {
    let mut context = CallContext::new();
    if let Some(task_id) = task_id {
        context.insert("task_id".into(), task_id.to_string());
    }
    if let Some(worker_id) = worker_id {
        context.insert("worker_id".into(), worker_id.to_string());
    }
    context
}

/// Serves worker RPCs against a scheduler, wrapping each call in the
/// error-capture middleware.
#[derive(Clone)]
pub struct RpcHandler {
    scheduler: Arc<Scheduler>,
    capture: ErrorCapture,
}

impl RpcHandler {
    /// Create a handler.
    pub fn new(scheduler: Arc<Scheduler>, capture: ErrorCapture) -> Self {
        Self { scheduler, capture }
    }

    /// Underlying scheduler.
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// `register`.
    pub fn register(&self, req: RegisterRequest) -> Result<TaskStatusResponse, RpcError> {
        let context = call_context(Some(&req.task_id), req.worker_id.as_deref());
        self.capture
            .run("register", context, || {
                if let Some(worker_id) = &req.worker_id {
                    self.scheduler.ping(worker_id)?;
                }
                let record = self.scheduler.register(&req.task_id, req.dependencies)?;
                Ok(TaskStatusResponse::from_record(&record))
            })
            .map_err(RpcError::from)
    }

    /// `request_work`.
    pub fn request_work(&self, req: &WorkRequest) -> Result<WorkResponse, RpcError> {
        let context = call_context(None, Some(&req.worker_id));
        self.capture
            .run("request_work", context, || {
                self.scheduler
                    .request_work(&req.worker_id)
                    .map(|task_id| WorkResponse { task_id })
            })
            .map_err(RpcError::from)
    }

    /// `report_done`.
    pub fn report_done(&self, req: &ReportRequest) -> Result<DoneResponse, RpcError> {
        let context = call_context(Some(&req.task_id), Some(&req.worker_id));
        self.capture
            .run("report_done", context, || {
                self.scheduler
                    .report_done(&req.task_id, &req.worker_id)
                    .map(|unblocked| DoneResponse { unblocked })
            })
            .map_err(RpcError::from)
    }

    /// `report_failed`.
    pub fn report_failed(&self, req: &ReportRequest) -> Result<TaskStatusResponse, RpcError> {
        let context = call_context(Some(&req.task_id), Some(&req.worker_id));
        self.capture
            .run("report_failed", context, || {
                self.scheduler.report_failed(&req.task_id, &req.worker_id)?;
                self.scheduler
                    .get(&req.task_id)
                    .map(|record| TaskStatusResponse::from_record(&record))
            })
            .map_err(RpcError::from)
    }

    /// Administrative `disable`.
    pub fn disable(&self, task_id: &str) -> Result<(), RpcError> {
        self.capture
            .run("disable", call_context(Some(task_id), None), || {
                self.scheduler.disable(task_id)
            })
            .map_err(RpcError::from)
    }

    /// Worker heartbeat.
    pub fn ping(&self, worker_id: &str) -> Result<(), RpcError> {
        self.capture
            .run("ping", call_context(None, Some(worker_id)), || {
                self.scheduler.ping(worker_id)
            })
            .map_err(RpcError::from)
    }

    /// Status of one task.
    pub fn task_status(&self, task_id: &str) -> Result<TaskStatusResponse, RpcError> {
        self.capture
            .run("task_status", call_context(Some(task_id), None), || {
                self.scheduler
                    .get(task_id)
                    .map(|r| TaskStatusResponse::from_record(&r))
            })
            .map_err(RpcError::from)
    }

    /// Tasks in `status`, in registration order.
    pub fn task_list(&self, status: TaskStatus) -> Vec<TaskStatusResponse> {
        self.scheduler
            .task_list(status)
            .iter()
            .map(|r| TaskStatusResponse::from_record(r))
            .collect()
    }

    /// History of a task after an optional sequence cursor.
    pub fn history(&self, task_id: &str, after: Option<u64>) -> Vec<HistoryEntry> {
        self.scheduler.history_from(task_id, after)
    }

    /// Health and stats.
    pub fn health(&self) -> Health {
        let serving = self.scheduler.is_serving();
        let checkpoint_failures = self.scheduler.checkpoint_failures();
        Health {
            ok: serving && checkpoint_failures == 0,
            serving,
            counts: self.scheduler.counts(),
            checkpoint_failures,
        }
    }
}
