//! Task record and status model.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a schedulable task.
pub type TaskId = String;

/// Identifier of a worker process.
pub type WorkerId = String;

/// Status of a task in the scheduler lifecycle.
///
/// Transitions:
/// - Pending -> Running -> Done
/// - Pending -> Running -> Failed -> Pending (while the retry budget lasts)
/// - Pending | Failed -> Disabled (administrative, terminal)
///
/// A task resting in `Failed` has exhausted its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Waiting for dependencies or for a worker.
    Pending,
    /// Assigned to a worker.
    Running,
    /// Finished successfully.
    Done,
    /// Failed with no retries left.
    Failed,
    /// Switched off by an operator.
    Disabled,
}

impl TaskStatus {
    /// No further transitions happen without operator action.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Disabled)
    }

    /// Upstream tasks in this status keep their dependents from ever running.
    pub const fn blocks_dependents(self) -> bool {
        matches!(self, Self::Failed | Self::Disabled)
    }

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique task identifier.
    pub id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Dependencies in registration order, without duplicates.
    pub dependencies: Vec<TaskId>,
    /// Registered tasks that depend on this one. Rebuilt on load.
    #[serde(skip)]
    pub dependents: BTreeSet<TaskId>,
    /// Worker holding the task while it is running.
    pub worker: Option<WorkerId>,
    /// Number of FAILED -> PENDING retries taken so far.
    pub retry_count: u32,
    /// Last status change, milliseconds since epoch.
    pub updated_at_ms: u128,
    /// Registration order used for tie-breaking.
    pub registered_seq: u64,
}

impl TaskRecord {
    /// Create a fresh pending record.
    pub fn new(id: impl Into<TaskId>, dependencies: Vec<TaskId>, seq: u64, now_ms: u128) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            dependencies,
            dependents: BTreeSet::new(),
            worker: None,
            retry_count: 0,
            updated_at_ms: now_ms,
            registered_seq: seq,
        }
    }

    /// A task that failed and may not be retried any more.
    pub fn is_exhausted(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Deduplicate while keeping first-seen order.
pub(crate) fn ordered_unique(ids: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
