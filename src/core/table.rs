//! In-memory task state table.
//!
//! The table is the authoritative mapping of task id to [`TaskRecord`]. It
//! keeps forward edges on each record (`dependencies`) and reverse edges
//! (`dependents`) in sync. Edges that point at ids nobody has registered yet
//! are parked in `unresolved` until the dependency shows up.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::task::ordered_unique;
use crate::core::{SchedulerError, SchedulerSnapshot, TaskId, TaskRecord, TaskStatus, WorkerId};

/// Result of [`TaskTable::upsert`].
#[derive(Debug, Clone)]
pub struct Upserted {
    /// The record after the upsert.
    pub record: TaskRecord,
    /// True when the task did not exist before.
    pub created: bool,
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// PENDING tasks.
    pub pending: usize,
    /// RUNNING tasks.
    pub running: usize,
    /// DONE tasks.
    pub done: usize,
    /// FAILED (retry budget exhausted) tasks.
    pub failed: usize,
    /// DISABLED tasks.
    pub disabled: usize,
}

/// Authoritative task id -> record mapping.
#[derive(Debug, Default)]
pub struct TaskTable {
    records: HashMap<TaskId, TaskRecord>,
    /// Registration order.
    order: BTreeMap<u64, TaskId>,
    /// Dependents of ids that are not registered.
    unresolved: HashMap<TaskId, BTreeSet<TaskId>>,
    next_seq: u64,
}

impl TaskTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no task is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `task_id` is registered.
    pub fn contains(&self, task_id: &str) -> bool {
        self.records.contains_key(task_id)
    }

    /// Look up a record.
    pub fn get(&self, task_id: &str) -> Result<&TaskRecord, SchedulerError> {
        self.records
            .get(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.order.values().filter_map(|id| self.records.get(id))
    }

    /// Insert a task or extend a pending one with new dependencies.
    ///
    /// The status of an existing task is never changed. Dependencies of a
    /// task that already left PENDING are frozen and new ones are ignored.
    pub fn upsert(
        &mut self,
        task_id: &str,
        dependencies: Vec<TaskId>,
        now_ms: u128,
    ) -> Result<Upserted, SchedulerError> {
        if task_id.is_empty() {
            return Err(SchedulerError::Validation("task id must not be empty".into()));
        }
        let dependencies = ordered_unique(dependencies);
        if dependencies.iter().any(String::is_empty) {
            return Err(SchedulerError::Validation(format!(
                "task {task_id} names an empty dependency id"
            )));
        }
        if dependencies.iter().any(|d| d == task_id) {
            return Err(SchedulerError::Validation(format!(
                "task {task_id} cannot depend on itself"
            )));
        }

        let added: Vec<TaskId> = match self.records.get(task_id) {
            Some(existing) if existing.status != TaskStatus::Pending => {
                return Ok(Upserted {
                    record: existing.clone(),
                    created: false,
                });
            }
            Some(existing) => dependencies
                .into_iter()
                .filter(|d| !existing.dependencies.contains(d))
                .collect(),
            None => dependencies,
        };

        if let Some(dep) = added.iter().find(|dep| self.reaches(dep, task_id)) {
            return Err(SchedulerError::Validation(format!(
                "dependency {dep} of {task_id} would create a cycle"
            )));
        }

        let created = !self.records.contains_key(task_id);
        if created {
            let seq = self.next_seq;
            self.next_seq += 1;
            let mut record = TaskRecord::new(task_id, Vec::new(), seq, now_ms);
            record.dependents = self.unresolved.remove(task_id).unwrap_or_default();
            self.order.insert(seq, task_id.to_string());
            self.records.insert(task_id.to_string(), record);
        }

        for dep in &added {
            self.link(dep, task_id);
        }
        let record = self
            .records
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))?;
        record.dependencies.extend(added);

        Ok(Upserted {
            record: record.clone(),
            created,
        })
    }

    /// Set the status of a task, returning the previous one.
    ///
    /// Leaving RUNNING releases the worker. FAILED -> PENDING consumes one
    /// retry.
    pub fn set_status(
        &mut self,
        task_id: &str,
        status: TaskStatus,
        now_ms: u128,
    ) -> Result<TaskStatus, SchedulerError> {
        let record = self.get_mut(task_id)?;
        let previous = record.status;
        if previous == TaskStatus::Failed && status == TaskStatus::Pending {
            record.retry_count += 1;
        }
        if status != TaskStatus::Running {
            record.worker = None;
        }
        record.status = status;
        record.updated_at_ms = now_ms;
        Ok(previous)
    }

    /// Hand a ready task to a worker.
    pub fn assign(
        &mut self,
        task_id: &str,
        worker: &str,
        now_ms: u128,
    ) -> Result<TaskStatus, SchedulerError> {
        let previous = self.set_status(task_id, TaskStatus::Running, now_ms)?;
        self.get_mut(task_id)?.worker = Some(worker.to_string());
        Ok(previous)
    }

    /// Whether the task is PENDING and every dependency is registered and DONE.
    pub fn is_ready(&self, task_id: &str) -> bool {
        self.records
            .get(task_id)
            .is_some_and(|record| self.record_ready(record))
    }

    fn record_ready(&self, record: &TaskRecord) -> bool {
        record.status == TaskStatus::Pending
            && record.dependencies.iter().all(|dep| {
                self.records
                    .get(dep)
                    .is_some_and(|d| d.status == TaskStatus::Done)
            })
    }

    /// Ready task ids in registration order.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.iter()
            .filter(|record| self.record_ready(record))
            .map(|record| record.id.clone())
            .collect()
    }

    /// Earliest-registered ready task.
    pub fn next_ready(&self) -> Option<TaskId> {
        self.iter()
            .find(|record| self.record_ready(record))
            .map(|record| record.id.clone())
    }

    /// Tasks currently held by `worker`.
    pub fn running_on(&self, worker: &str) -> Vec<TaskId> {
        self.iter()
            .filter(|r| r.status == TaskStatus::Running && r.worker.as_deref() == Some(worker))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Workers holding at least one RUNNING task.
    pub fn busy_workers(&self) -> BTreeSet<WorkerId> {
        self.records
            .values()
            .filter(|r| r.status == TaskStatus::Running)
            .filter_map(|r| r.worker.clone())
            .collect()
    }

    /// Tasks no other registered task depends on.
    pub fn roots(&self) -> Vec<TaskId> {
        self.iter()
            .filter(|r| r.dependents.is_empty())
            .map(|r| r.id.clone())
            .collect()
    }

    /// Whether a FAILED or DISABLED task sits anywhere upstream of `task_id`.
    pub fn upstream_blocked(&self, task_id: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = self
            .records
            .get(task_id)
            .map(|r| r.dependencies.iter().map(String::as_str).collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(record) = self.records.get(id) {
                if record.status.blocks_dependents() {
                    return true;
                }
                stack.extend(record.dependencies.iter().map(String::as_str));
            }
        }
        false
    }

    /// Per-status counts.
    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for record in self.records.values() {
            match record.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Done => counts.done += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Disabled => counts.disabled += 1,
            }
        }
        counts
    }

    /// Remove every record that is not connected to `retain` or to a RUNNING
    /// task.
    ///
    /// Connectivity follows both dependency and dependent edges, so in-flight
    /// work keeps the graph it may be retried against. Returns the removed ids
    /// in registration order.
    pub fn prune(&mut self, retain: &HashSet<TaskId>) -> Vec<TaskId> {
        let mut keep: HashSet<TaskId> = HashSet::new();
        let mut queue: VecDeque<&TaskId> = retain
            .iter()
            .filter(|id| self.records.contains_key(*id))
            .chain(
                self.records
                    .values()
                    .filter(|r| r.status == TaskStatus::Running)
                    .map(|r| &r.id),
            )
            .collect();
        while let Some(id) = queue.pop_front() {
            if !keep.insert(id.clone()) {
                continue;
            }
            if let Some(record) = self.records.get(id) {
                queue.extend(
                    record
                        .dependencies
                        .iter()
                        .chain(record.dependents.iter())
                        .filter(|next| self.records.contains_key(*next) && !keep.contains(*next)),
                );
            }
        }

        let doomed: Vec<TaskId> = self
            .iter()
            .filter(|r| r.status != TaskStatus::Running && !keep.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();

        let removed: Vec<TaskRecord> = doomed
            .iter()
            .filter_map(|id| self.records.remove(id))
            .collect();
        for record in &removed {
            self.order.remove(&record.registered_seq);
            for dep in &record.dependencies {
                self.unlink(dep, &record.id);
            }
        }
        doomed
    }

    /// Point-in-time copy for persistence.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::new(self.next_seq, self.iter().cloned().collect())
    }

    /// Rebuild a table from a decoded snapshot.
    pub fn from_snapshot(snapshot: SchedulerSnapshot) -> Result<Self, SchedulerError> {
        let mut table = Self::new();
        let mut max_seq = None;
        for mut record in snapshot.tasks {
            if record.id.is_empty() {
                return Err(SchedulerError::CorruptState("record with empty id".into()));
            }
            if record.dependencies.contains(&record.id) {
                return Err(SchedulerError::CorruptState(format!(
                    "task {} depends on itself",
                    record.id
                )));
            }
            if table.order.contains_key(&record.registered_seq) {
                return Err(SchedulerError::CorruptState(format!(
                    "duplicate registration sequence {}",
                    record.registered_seq
                )));
            }
            if record.status != TaskStatus::Running {
                record.worker = None;
            }
            record.dependents.clear();
            max_seq = max_seq.max(Some(record.registered_seq));
            table.order.insert(record.registered_seq, record.id.clone());
            if let Some(dup) = table.records.insert(record.id.clone(), record) {
                return Err(SchedulerError::CorruptState(format!(
                    "duplicate task id {}",
                    dup.id
                )));
            }
        }

        let edges: Vec<(TaskId, TaskId)> = table
            .records
            .values()
            .flat_map(|r| r.dependencies.iter().map(|d| (d.clone(), r.id.clone())))
            .collect();
        for (dep, dependent) in &edges {
            table.link(dep, dependent);
        }
        if let Some((dep, dependent)) = edges.iter().find(|(dep, dependent)| table.reaches(dep, dependent)) {
            return Err(SchedulerError::CorruptState(format!(
                "dependency cycle between {dep} and {dependent}"
            )));
        }
        table.next_seq = snapshot.next_seq.max(max_seq.map_or(0, |s| s + 1));
        Ok(table)
    }

    fn get_mut(&mut self, task_id: &str) -> Result<&mut TaskRecord, SchedulerError> {
        self.records
            .get_mut(task_id)
            .ok_or_else(|| SchedulerError::TaskNotFound(task_id.to_string()))
    }

    /// Whether `from` reaches `target` following dependency edges.
    fn reaches(&self, from: &str, target: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(record) = self.records.get(id) {
                stack.extend(record.dependencies.iter().map(String::as_str));
            }
        }
        false
    }

    fn link(&mut self, dependency: &str, dependent: &str) {
        match self.records.get_mut(dependency) {
            Some(record) => {
                record.dependents.insert(dependent.to_string());
            }
            None => {
                self.unresolved
                    .entry(dependency.to_string())
                    .or_default()
                    .insert(dependent.to_string());
            }
        }
    }

    fn unlink(&mut self, dependency: &str, dependent: &str) {
        if let Some(record) = self.records.get_mut(dependency) {
            record.dependents.remove(dependent);
            return;
        }
        if let Some(waiting) = self.unresolved.get_mut(dependency) {
            waiting.remove(dependent);
            if waiting.is_empty() {
                self.unresolved.remove(dependency);
            }
        }
    }
}
