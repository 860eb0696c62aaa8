//! Central scheduler: the single writer of the task state table.
//!
//! Every mutating call takes one `parking_lot::Mutex` around the table and
//! worker liveness map, so graph-wide readiness is always computed from a
//! consistent view. History is written after the lock is released, and
//! persistence I/O never happens under it: `checkpoint` copies the table
//! while locked and serializes and saves unlocked.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::{
    HistoryEntry, SchedulerError, SchedulerSnapshot, StateStore, StoreError, TaskCounts,
    TaskHistory, TaskId, TaskRecord, TaskStatus, TaskTable, WorkerId,
};
use crate::util::clock::{duration_ms, now_ms};

/// Scheduling policy knobs.
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    /// Failures that are retried before a task rests in FAILED.
    pub max_retries: u32,
    /// Worker silence after which its RUNNING tasks are failed.
    pub worker_disconnect: Duration,
    /// How long a finished root keeps its graph from being pruned.
    pub retention: Duration,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            worker_disconnect: Duration::from_secs(60),
            retention: Duration::from_secs(600),
        }
    }
}

impl SchedulerPolicy {
    /// Override the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the worker disconnect delay.
    #[must_use]
    pub const fn with_worker_disconnect(mut self, delay: Duration) -> Self {
        self.worker_disconnect = delay;
        self
    }

    /// Override the retention of finished roots.
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// What happened to a task reported as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to PENDING; `retry_count` retries used so far.
    Retrying {
        /// Retries consumed including this one.
        retry_count: u32,
    },
    /// Retry budget exhausted; the task stays FAILED.
    Exhausted,
}

/// Result of one stale-prune sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Workers considered gone.
    pub dead_workers: Vec<WorkerId>,
    /// RUNNING tasks failed because their worker went silent.
    pub failed_tasks: Vec<TaskId>,
    /// Records removed from the table.
    pub removed: Vec<TaskId>,
}

struct Transition {
    task_id: TaskId,
    previous: Option<TaskStatus>,
    new: TaskStatus,
    worker: Option<WorkerId>,
}

impl Transition {
    fn new(task_id: &str, previous: Option<TaskStatus>, new: TaskStatus, worker: Option<&str>) -> Self {
        Self {
            task_id: task_id.to_string(),
            previous,
            new,
            worker: worker.map(str::to_string),
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    table: TaskTable,
    /// Worker id -> last contact, milliseconds since epoch.
    workers: HashMap<WorkerId, u128>,
}

impl SchedulerState {
    fn touch(&mut self, worker: &str, now_ms: u128) {
        self.workers.insert(worker.to_string(), now_ms);
    }

    /// RUNNING -> FAILED, then back to PENDING if the budget allows.
    fn fail_task(
        &mut self,
        task_id: &str,
        worker: &str,
        max_retries: u32,
        now_ms: u128,
        transitions: &mut Vec<Transition>,
    ) -> Result<FailureOutcome, SchedulerError> {
        let previous = self.table.set_status(task_id, TaskStatus::Failed, now_ms)?;
        transitions.push(Transition::new(task_id, Some(previous), TaskStatus::Failed, Some(worker)));

        if self.table.get(task_id)?.retry_count < max_retries {
            self.table.set_status(task_id, TaskStatus::Pending, now_ms)?;
            transitions.push(Transition::new(
                task_id,
                Some(TaskStatus::Failed),
                TaskStatus::Pending,
                None,
            ));
            let retry_count = self.table.get(task_id)?.retry_count;
            Ok(FailureOutcome::Retrying { retry_count })
        } else {
            Ok(FailureOutcome::Exhausted)
        }
    }
}

/// The orchestration engine.
pub struct Scheduler {
    policy: SchedulerPolicy,
    state: Mutex<SchedulerState>,
    history: TaskHistory,
    store: Arc<dyn StateStore>,
    serving: AtomicBool,
    checkpoint_gate: tokio::sync::Mutex<()>,
    checkpoint_failures: AtomicU32,
}

impl Scheduler {
    /// Compose a scheduler from its collaborators. Call [`Scheduler::bootstrap`]
    /// before routing requests to it.
    pub fn new(policy: SchedulerPolicy, store: Arc<dyn StateStore>, history: TaskHistory) -> Self {
        Self {
            policy,
            state: Mutex::new(SchedulerState::default()),
            history,
            store,
            serving: AtomicBool::new(false),
            checkpoint_gate: tokio::sync::Mutex::new(()),
            checkpoint_failures: AtomicU32::new(0),
        }
    }

    /// Active policy.
    pub const fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    /// Whether bootstrap completed and requests are accepted.
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    fn ensure_serving(&self) -> Result<(), SchedulerError> {
        if self.is_serving() {
            Ok(())
        } else {
            Err(SchedulerError::NotServing)
        }
    }

    /// Queue transitions while the table lock is still held, so history
    /// order matches table order. Follow with `history.flush()` once the
    /// lock is released.
    fn record_all(&self, transitions: Vec<Transition>) {
        for t in transitions {
            self.history
                .record(&t.task_id, t.previous, t.new, t.worker.as_deref());
        }
    }

    /// Load the persisted snapshot and start serving.
    ///
    /// A missing snapshot starts an empty table. Any other store error or an
    /// unreadable snapshot is returned and the scheduler keeps refusing work.
    pub async fn bootstrap(&self) -> Result<usize, SchedulerError> {
        if self.is_serving() {
            return Err(SchedulerError::Validation("scheduler already bootstrapped".into()));
        }

        let table = match self.store.load().await {
            Ok(bytes) => TaskTable::from_snapshot(SchedulerSnapshot::decode(&bytes)?)?,
            Err(StoreError::NotFound) => {
                tracing::info!("no persisted scheduler state, starting empty");
                TaskTable::new()
            }
            Err(e) => {
                tracing::error!("failed to load scheduler state: {}", e);
                return Err(e.into());
            }
        };

        let loaded = table.len();
        {
            let now = now_ms();
            let mut state = self.state.lock();
            state.workers = table.busy_workers().into_iter().map(|w| (w, now)).collect();
            state.table = table;
        }
        self.serving.store(true, Ordering::Release);
        tracing::info!("scheduler bootstrapped with {} tasks", loaded);
        Ok(loaded)
    }

    /// Register a task and its dependencies. Idempotent; never changes the
    /// status of a known task.
    pub fn register(&self, task_id: &str, dependencies: Vec<TaskId>) -> Result<TaskRecord, SchedulerError> {
        self.ensure_serving()?;
        let upserted = {
            let mut state = self.state.lock();
            let upserted = state.table.upsert(task_id, dependencies, now_ms())?;
            if upserted.created {
                self.history.record(task_id, None, TaskStatus::Pending, None);
            }
            upserted
        };
        self.history.flush();
        if upserted.created {
            tracing::info!("task {} registered", task_id);
        } else {
            tracing::debug!("task {} re-registered", task_id);
        }
        Ok(upserted.record)
    }

    /// Assign the earliest-registered ready task to `worker_id`.
    ///
    /// Never waits: returns `None` when nothing is ready.
    pub fn request_work(&self, worker_id: &str) -> Result<Option<TaskId>, SchedulerError> {
        self.ensure_serving()?;
        validate_worker(worker_id)?;
        let now = now_ms();
        let assigned = {
            let mut state = self.state.lock();
            state.touch(worker_id, now);
            match state.table.next_ready() {
                Some(task_id) => {
                    let previous = state.table.assign(&task_id, worker_id, now)?;
                    self.history
                        .record(&task_id, Some(previous), TaskStatus::Running, Some(worker_id));
                    Some(task_id)
                }
                None => None,
            }
        };

        if let Some(task_id) = &assigned {
            self.history.flush();
            tracing::info!("task {} assigned to {}", task_id, worker_id);
        }
        Ok(assigned)
    }

    /// Mark a running task DONE. Returns the dependents that became ready.
    pub fn report_done(&self, task_id: &str, worker_id: &str) -> Result<Vec<TaskId>, SchedulerError> {
        self.ensure_serving()?;
        let now = now_ms();
        let unblocked = {
            let mut state = self.state.lock();
            check_assignment(&state.table, task_id, worker_id)?;
            state.touch(worker_id, now);
            let previous = state.table.set_status(task_id, TaskStatus::Done, now)?;
            self.history
                .record(task_id, Some(previous), TaskStatus::Done, Some(worker_id));
            let unblocked: Vec<TaskId> = state
                .table
                .get(task_id)?
                .dependents
                .iter()
                .filter(|d| state.table.is_ready(d))
                .cloned()
                .collect();
            unblocked
        };

        self.history.flush();
        tracing::info!("task {} done on {}", task_id, worker_id);
        if !unblocked.is_empty() {
            tracing::debug!("task {} unblocked {:?}", task_id, unblocked);
        }
        Ok(unblocked)
    }

    /// Mark a running task failed, retrying it while the budget lasts.
    pub fn report_failed(&self, task_id: &str, worker_id: &str) -> Result<FailureOutcome, SchedulerError> {
        self.ensure_serving()?;
        let now = now_ms();
        let mut transitions = Vec::new();
        let outcome = {
            let mut state = self.state.lock();
            check_assignment(&state.table, task_id, worker_id)?;
            state.touch(worker_id, now);
            let outcome =
                state.fail_task(task_id, worker_id, self.policy.max_retries, now, &mut transitions)?;
            self.record_all(transitions);
            outcome
        };
        self.history.flush();

        match outcome {
            FailureOutcome::Retrying { retry_count } => {
                tracing::warn!("task {} failed on {}, retry {}", task_id, worker_id, retry_count);
            }
            FailureOutcome::Exhausted => {
                tracing::error!("task {} failed on {}, retries exhausted", task_id, worker_id);
            }
        }
        Ok(outcome)
    }

    /// Administratively disable a PENDING or FAILED task. Terminal.
    pub fn disable(&self, task_id: &str) -> Result<(), SchedulerError> {
        self.ensure_serving()?;
        {
            let mut state = self.state.lock();
            let current = state.table.get(task_id)?.status;
            if !matches!(current, TaskStatus::Pending | TaskStatus::Failed) {
                return Err(SchedulerError::InvalidTransition {
                    task_id: task_id.to_string(),
                    from: current.to_string(),
                    to: TaskStatus::Disabled.to_string(),
                });
            }
            let previous = state.table.set_status(task_id, TaskStatus::Disabled, now_ms())?;
            self.history
                .record(task_id, Some(previous), TaskStatus::Disabled, None);
        }
        self.history.flush();
        tracing::warn!("task {} disabled", task_id);
        Ok(())
    }

    /// Refresh a worker's liveness.
    pub fn ping(&self, worker_id: &str) -> Result<(), SchedulerError> {
        self.ensure_serving()?;
        validate_worker(worker_id)?;
        self.state.lock().touch(worker_id, now_ms());
        Ok(())
    }

    /// Fail tasks of silent workers and prune records unreachable from
    /// active roots.
    pub fn prune_stale(&self) -> Result<PruneReport, SchedulerError> {
        self.prune_stale_at(now_ms())
    }

    /// [`Scheduler::prune_stale`] evaluated at an explicit time.
    pub fn prune_stale_at(&self, now_ms: u128) -> Result<PruneReport, SchedulerError> {
        self.ensure_serving()?;
        let disconnect_ms = duration_ms(self.policy.worker_disconnect);
        let retention_ms = duration_ms(self.policy.retention);
        let mut transitions = Vec::new();
        let mut report = PruneReport::default();
        {
            let mut state = self.state.lock();
            let mut dead: Vec<WorkerId> = state
                .workers
                .iter()
                .filter(|(_, seen)| now_ms.saturating_sub(**seen) > disconnect_ms)
                .map(|(w, _)| w.clone())
                .collect();
            dead.sort();
            for worker in &dead {
                state.workers.remove(worker);
                for task_id in state.table.running_on(worker) {
                    state.fail_task(&task_id, worker, self.policy.max_retries, now_ms, &mut transitions)?;
                    report.failed_tasks.push(task_id);
                }
            }
            report.dead_workers = dead;

            let retain: HashSet<TaskId> = state
                .table
                .roots()
                .into_iter()
                .filter(|id| {
                    state.table.get(id).is_ok_and(|r| {
                        !r.status.is_terminal()
                            || now_ms.saturating_sub(r.updated_at_ms) < retention_ms
                    })
                })
                .collect();
            report.removed = state.table.prune(&retain);
            self.record_all(transitions);
        }
        self.history.flush();

        for task_id in &report.failed_tasks {
            tracing::warn!("task {} failed: worker disconnected", task_id);
        }
        if !report.removed.is_empty() {
            tracing::info!("pruned {} stale tasks", report.removed.len());
        }
        Ok(report)
    }

    /// Persist a consistent copy of the table through the state store.
    ///
    /// Only the copy is taken under the table lock. Concurrent checkpoints
    /// are serialized so an older copy never overwrites a newer one.
    pub async fn checkpoint(&self) -> Result<usize, SchedulerError> {
        self.ensure_serving()?;
        let _gate = self.checkpoint_gate.lock().await;
        let snapshot = self.state.lock().table.snapshot();
        let count = snapshot.tasks.len();
        let bytes = snapshot.encode()?;

        match self.store.save(bytes).await {
            Ok(()) => {
                let previous_failures = self.checkpoint_failures.swap(0, Ordering::AcqRel);
                if previous_failures > 0 {
                    tracing::info!("checkpoint recovered after {} failures", previous_failures);
                }
                tracing::debug!("checkpointed {} tasks", count);
                Ok(count)
            }
            Err(e) => {
                let failures = self.checkpoint_failures.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::error!(consecutive_failures = failures, "checkpoint failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Consecutive failed checkpoints since the last success.
    pub fn checkpoint_failures(&self) -> u32 {
        self.checkpoint_failures.load(Ordering::Acquire)
    }

    /// Copy of one record.
    pub fn get(&self, task_id: &str) -> Result<TaskRecord, SchedulerError> {
        self.state.lock().table.get(task_id).cloned()
    }

    /// Ready task ids in registration order.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.state.lock().table.ready_tasks()
    }

    /// Records with `status`, in registration order.
    pub fn task_list(&self, status: TaskStatus) -> Vec<TaskRecord> {
        self.state
            .lock()
            .table
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect()
    }

    /// Per-status counts.
    pub fn counts(&self) -> TaskCounts {
        self.state.lock().table.counts()
    }

    /// PENDING tasks that can still run: no FAILED or DISABLED task upstream.
    pub fn pending_task_count(&self) -> usize {
        let state = self.state.lock();
        state
            .table
            .iter()
            .filter(|r| r.status == TaskStatus::Pending && !state.table.upstream_blocked(&r.id))
            .count()
    }

    /// RUNNING tasks.
    pub fn running_task_count(&self) -> usize {
        self.state.lock().table.counts().running
    }

    /// Chronological history of a task.
    pub fn history(&self, task_id: &str) -> Vec<HistoryEntry> {
        self.history.query(task_id)
    }

    /// History of a task after sequence `after`.
    pub fn history_from(&self, task_id: &str, after: Option<u64>) -> Vec<HistoryEntry> {
        self.history.query_from(task_id, after)
    }
}

fn validate_worker(worker_id: &str) -> Result<(), SchedulerError> {
    if worker_id.is_empty() {
        return Err(SchedulerError::Validation("worker id must not be empty".into()));
    }
    Ok(())
}

fn check_assignment(table: &TaskTable, task_id: &str, worker_id: &str) -> Result<(), SchedulerError> {
    let record = table.get(task_id)?;
    if record.status == TaskStatus::Running && record.worker.as_deref() == Some(worker_id) {
        return Ok(());
    }
    Err(SchedulerError::WorkerMismatch {
        task_id: task_id.to_string(),
        assigned: record.worker.clone(),
        reported: worker_id.to_string(),
    })
}
