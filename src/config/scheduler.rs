//! Scheduler configuration structures.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{RemoteLocation, SchedulerPolicy};

/// Object store used by the remote state tier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// Process-local object map, for development and tests.
    #[default]
    InMemory,
    /// Directory tree with one subdirectory per bucket.
    Filesystem {
        /// Root directory of the buckets.
        root: PathBuf,
    },
}

/// Task history backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryBackendConfig {
    /// In-memory history.
    #[default]
    InMemory,
    /// JSON-lines file.
    File {
        /// History file path.
        path: PathBuf,
    },
}

/// Error-reporting middleware settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorReportingConfig {
    /// Forward captured errors to the reporter.
    pub enabled: bool,
    /// Static key-values attached to every report.
    pub context: BTreeMap<String, String>,
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Retries allowed before a task rests in FAILED.
    pub max_retries: u32,
    /// Checkpoint timer period in seconds.
    pub checkpoint_interval_secs: u64,
    /// Stale-prune timer period in seconds.
    pub prune_interval_secs: u64,
    /// Worker silence in seconds after which its RUNNING tasks fail.
    pub worker_disconnect_secs: u64,
    /// Seconds a finished root keeps its graph from being pruned.
    pub retention_secs: u64,
    /// Local snapshot path.
    pub state_path: PathBuf,
    /// `scheme://bucket/key` of the remote snapshot. `None` keeps state local.
    pub remote_state_path: Option<String>,
    /// Object store behind `remote_state_path`.
    pub object_store: ObjectStoreConfig,
    /// History backend.
    pub history: HistoryBackendConfig,
    /// Error reporting.
    pub error_reporting: ErrorReportingConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            checkpoint_interval_secs: 60,
            prune_interval_secs: 60,
            worker_disconnect_secs: 60,
            retention_secs: 600,
            state_path: PathBuf::from("state.json"),
            remote_state_path: None,
            object_store: ObjectStoreConfig::default(),
            history: HistoryBackendConfig::default(),
            error_reporting: ErrorReportingConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.checkpoint_interval_secs == 0 {
            return Err("checkpoint_interval_secs must be greater than 0".into());
        }
        if self.prune_interval_secs == 0 {
            return Err("prune_interval_secs must be greater than 0".into());
        }
        if self.worker_disconnect_secs == 0 {
            return Err("worker_disconnect_secs must be greater than 0".into());
        }
        if self.state_path.as_os_str().is_empty() {
            return Err("state_path must not be empty".into());
        }
        self.remote_location()?;
        if let HistoryBackendConfig::File { path } = &self.history {
            if path.as_os_str().is_empty() {
                return Err("history file path must not be empty".into());
            }
        }
        Ok(())
    }

    /// Parsed remote location, if the remote tier is configured.
    pub fn remote_location(&self) -> Result<Option<RemoteLocation>, String> {
        self.remote_state_path
            .as_deref()
            .map(|raw| RemoteLocation::parse(raw).map_err(|e| format!("remote_state_path invalid: {e}")))
            .transpose()
    }

    /// Scheduling policy derived from this configuration.
    pub const fn policy(&self) -> SchedulerPolicy {
        SchedulerPolicy {
            max_retries: self.max_retries,
            worker_disconnect: Duration::from_secs(self.worker_disconnect_secs),
            retention: Duration::from_secs(self.retention_secs),
        }
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: SchedulerConfig =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SCHEDULER_*` environment variables, loading
    /// a `.env` file first if present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(v) = env_parse("SCHEDULER_MAX_RETRIES")? {
            cfg.max_retries = v;
        }
        if let Some(v) = env_parse("SCHEDULER_CHECKPOINT_INTERVAL_SECS")? {
            cfg.checkpoint_interval_secs = v;
        }
        if let Some(v) = env_parse("SCHEDULER_PRUNE_INTERVAL_SECS")? {
            cfg.prune_interval_secs = v;
        }
        if let Some(v) = env_parse("SCHEDULER_WORKER_DISCONNECT_SECS")? {
            cfg.worker_disconnect_secs = v;
        }
        if let Some(v) = env_parse("SCHEDULER_RETENTION_SECS")? {
            cfg.retention_secs = v;
        }
        if let Some(v) = env_var("SCHEDULER_STATE_PATH") {
            cfg.state_path = PathBuf::from(v);
        }
        cfg.remote_state_path = env_var("SCHEDULER_REMOTE_STATE_PATH");
        if let Some(root) = env_var("SCHEDULER_OBJECT_STORE_ROOT") {
            cfg.object_store = ObjectStoreConfig::Filesystem { root: root.into() };
        }
        if let Some(path) = env_var("SCHEDULER_HISTORY_PATH") {
            cfg.history = HistoryBackendConfig::File { path: path.into() };
        }
        if let Some(v) = env_parse("SCHEDULER_ERROR_REPORTING")? {
            cfg.error_reporting.enabled = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| raw.trim().parse().map_err(|e| format!("{name}: {e}")))
        .transpose()
}
