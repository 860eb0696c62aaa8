//! Core scheduling abstractions: the task table, the scheduler that owns it,
//! and the capabilities (state store, history sink, error reporter) it is
//! composed with.

pub mod error;
pub mod history;
pub mod reporting;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod task;

pub use error::{AppResult, ErrorKind, SchedulerError, StoreError};
pub use history::{HistoryEntry, HistorySink, InMemoryHistorySink, TaskHistory};
pub use reporting::{CallContext, ContextProvider, ErrorCapture, ErrorReporter, TracingReporter};
pub use scheduler::{FailureOutcome, PruneReport, Scheduler, SchedulerPolicy};
pub use snapshot::SchedulerSnapshot;
pub use store::{ObjectStore, RemoteLocation, StateStore};
pub use table::{TaskCounts, TaskTable, Upserted};
pub use task::{TaskId, TaskRecord, TaskStatus, WorkerId};
