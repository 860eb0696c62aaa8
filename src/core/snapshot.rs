//! Versioned snapshot codec for the task state table.
//!
//! The snapshot is a single JSON document. The `format` and `version`
//! header is checked before the body is interpreted so that an unknown or
//! missing tag is rejected instead of being misread.

use serde::{Deserialize, Serialize};

use crate::core::{SchedulerError, TaskRecord};

/// Format tag written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "central-scheduler-snapshot";

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the whole task table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Always [`SNAPSHOT_FORMAT`].
    pub format: String,
    /// Layout version.
    pub version: u32,
    /// Next registration sequence number.
    pub next_seq: u64,
    /// All task records, in registration order.
    pub tasks: Vec<TaskRecord>,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    format: Option<String>,
    version: Option<u32>,
}

impl SchedulerSnapshot {
    /// Wrap records in a current-version snapshot.
    pub fn new(next_seq: u64, tasks: Vec<TaskRecord>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            next_seq,
            tasks,
        }
    }

    /// Encode as bytes for a state store.
    pub fn encode(&self) -> Result<Vec<u8>, SchedulerError> {
        serde_json::to_vec(self)
            .map_err(|e| SchedulerError::CorruptState(format!("snapshot encode failed: {e}")))
    }

    /// Decode bytes read from a state store, rejecting unknown formats.
    pub fn decode(bytes: &[u8]) -> Result<Self, SchedulerError> {
        let header: SnapshotHeader = serde_json::from_slice(bytes)
            .map_err(|e| SchedulerError::CorruptState(format!("snapshot is not readable: {e}")))?;

        match header.format.as_deref() {
            Some(SNAPSHOT_FORMAT) => {}
            Some(other) => {
                return Err(SchedulerError::CorruptState(format!(
                    "unknown snapshot format `{other}`"
                )))
            }
            None => return Err(SchedulerError::CorruptState("snapshot has no format tag".into())),
        }
        match header.version {
            Some(SNAPSHOT_VERSION) => {}
            Some(other) => {
                return Err(SchedulerError::CorruptState(format!(
                    "unsupported snapshot version {other} (expected {SNAPSHOT_VERSION})"
                )))
            }
            None => return Err(SchedulerError::CorruptState("snapshot is unversioned".into())),
        }

        serde_json::from_slice(bytes)
            .map_err(|e| SchedulerError::CorruptState(format!("snapshot body invalid: {e}")))
    }
}
