//! Error types for scheduler operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by durable state stores and object stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot (or remote object) exists at the configured location.
    #[error("snapshot not found")]
    NotFound,
    /// Local disk failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Remote object store failure with context.
    #[error("remote store error: {0}")]
    Remote(String),
    /// The remote location string could not be parsed.
    #[error("invalid remote location: {0}")]
    InvalidLocation(String),
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad caller input.
    #[error("validation error: {0}")]
    Validation(String),
    /// The task id is not registered.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// A worker reported on a task it does not hold.
    #[error("task {task_id} is assigned to {assigned:?}, not to {reported}")]
    WorkerMismatch {
        /// Task the report was about.
        task_id: String,
        /// Worker currently holding the task, if any.
        assigned: Option<String>,
        /// Worker that sent the report.
        reported: String,
    },
    /// The requested status change is not allowed from the current status.
    #[error("invalid transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// Task being transitioned.
        task_id: String,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
    /// The scheduler has not finished bootstrapping.
    #[error("scheduler is not serving yet")]
    NotServing,
    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Snapshot is unreadable, unversioned or internally inconsistent.
    #[error("corrupt scheduler state: {0}")]
    CorruptState(String),
    /// History recording or querying failed.
    #[error("history error: {0}")]
    History(String),
}

/// Coarse error classification returned to RPC callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller input was rejected.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// Persistence failed.
    Store,
    /// Persisted state could not be trusted.
    CorruptState,
    /// History subsystem failure.
    History,
    /// The scheduler is not accepting requests.
    Unavailable,
}

impl SchedulerError {
    /// Classify this error for structured responses.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::WorkerMismatch { .. } | Self::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            Self::TaskNotFound(_) => ErrorKind::NotFound,
            Self::NotServing => ErrorKind::Unavailable,
            Self::Store(_) => ErrorKind::Store,
            Self::CorruptState(_) => ErrorKind::CorruptState,
            Self::History(_) => ErrorKind::History,
        }
    }

    /// Whether this error was caused by the caller rather than the scheduler.
    pub const fn is_caller_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::NotFound)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
