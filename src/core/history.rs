//! Task history recording.
//!
//! History is diagnostic, never authoritative: a failing sink is logged and
//! otherwise ignored so it can never change a scheduling decision.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, TaskId, TaskStatus, WorkerId};
use crate::util::clock::now_ms;

/// One observed status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonic sequence number assigned by the recorder.
    pub seq: u64,
    /// Task that changed.
    pub task_id: TaskId,
    /// Status before the change; `None` for the registration itself.
    pub previous: Option<TaskStatus>,
    /// Status after the change.
    pub new: TaskStatus,
    /// Milliseconds since epoch.
    pub timestamp_ms: u128,
    /// Worker involved, if any.
    pub worker_id: Option<WorkerId>,
}

/// Storage backend for history entries.
///
/// Called from [`TaskHistory::flush`] outside the scheduler's table lock but
/// still on the caller's thread, which may be a runtime worker. Implementations
/// should buffer in `append` and do their I/O in `flush`.
pub trait HistorySink: Send {
    /// Append an entry.
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), SchedulerError>;
    /// Make appended entries durable. Called once per batch.
    fn flush(&mut self) -> Result<(), SchedulerError> {
        Ok(())
    }
    /// Entries for a task in chronological order.
    fn entries(&self, task_id: &str) -> Result<Vec<HistoryEntry>, SchedulerError>;
    /// Highest sequence number stored, used to resume numbering.
    fn last_seq(&self) -> Option<u64>;
}

/// In-memory history sink for testing and dev.
#[derive(Debug, Default)]
pub struct InMemoryHistorySink {
    entries: VecDeque<HistoryEntry>,
}

impl InMemoryHistorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored entries.
    pub fn all(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl HistorySink for InMemoryHistorySink {
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), SchedulerError> {
        self.entries.push_back(entry.clone());
        Ok(())
    }

    fn entries(&self, task_id: &str) -> Result<Vec<HistoryEntry>, SchedulerError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect())
    }

    fn last_seq(&self) -> Option<u64> {
        self.entries.back().map(|e| e.seq)
    }
}

/// Append-only recorder of task status transitions.
///
/// [`TaskHistory::record`] only numbers and queues an entry, so it is safe to
/// call while the scheduler holds its table lock. Queued entries reach the
/// sink in sequence order on [`TaskHistory::flush`], on every query and on
/// drop.
pub struct TaskHistory {
    queue: Mutex<Queue>,
    sink: Mutex<Box<dyn HistorySink>>,
}

struct Queue {
    next_seq: u64,
    entries: Vec<HistoryEntry>,
}

impl TaskHistory {
    /// Wrap a sink. Numbering continues after the sink's last entry.
    pub fn new(sink: Box<dyn HistorySink>) -> Self {
        let next_seq = sink.last_seq().map_or(0, |s| s + 1);
        Self {
            queue: Mutex::new(Queue {
                next_seq,
                entries: Vec::new(),
            }),
            sink: Mutex::new(sink),
        }
    }

    /// Recorder backed by [`InMemoryHistorySink`].
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryHistorySink::new()))
    }

    /// Number and queue a transition. Never touches the sink.
    pub fn record(
        &self,
        task_id: &str,
        previous: Option<TaskStatus>,
        new: TaskStatus,
        worker_id: Option<&str>,
    ) {
        let mut queue = self.queue.lock();
        let entry = HistoryEntry {
            seq: queue.next_seq,
            task_id: task_id.to_string(),
            previous,
            new,
            timestamp_ms: now_ms(),
            worker_id: worker_id.map(str::to_string),
        };
        queue.next_seq += 1;
        queue.entries.push(entry);
    }

    /// Write queued entries to the sink. Sink failures are logged and the
    /// failed entry is dropped.
    pub fn flush(&self) {
        // Draining under the sink lock keeps concurrent flushes in seq order.
        let mut sink = self.sink.lock();
        let batch = std::mem::take(&mut self.queue.lock().entries);
        if batch.is_empty() {
            return;
        }
        for entry in &batch {
            if let Err(e) = sink.append(entry) {
                tracing::warn!(task_id = %entry.task_id, status = %entry.new, "failed to record history: {}", e);
            }
        }
        if let Err(e) = sink.flush() {
            tracing::warn!("failed to flush history: {}", e);
        }
    }

    /// Chronological history for a task. Query failures yield an empty list.
    pub fn query(&self, task_id: &str) -> Vec<HistoryEntry> {
        self.query_from(task_id, None)
    }

    /// History for a task strictly after sequence `after`, for resuming a read.
    pub fn query_from(&self, task_id: &str, after: Option<u64>) -> Vec<HistoryEntry> {
        self.flush();
        let sink = self.sink.lock();
        match sink.entries(task_id) {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| after.is_none_or(|cursor| e.seq > cursor))
                .collect(),
            Err(e) => {
                tracing::warn!(task_id, "failed to query history: {}", e);
                Vec::new()
            }
        }
    }
}

impl Drop for TaskHistory {
    fn drop(&mut self) {
        self.flush();
    }
}
