//! Builders that compose a scheduler and its collaborators from configuration.

use std::sync::Arc;

use anyhow::Context;

use crate::config::{HistoryBackendConfig, ObjectStoreConfig, SchedulerConfig};
use crate::core::{
    AppResult, CallContext, ContextProvider, ErrorCapture, ErrorReporter, ObjectStore, Scheduler,
    SchedulerError, StateStore, TaskHistory,
};
use crate::infra::{
    FileSystemObjectStore, InMemoryObjectStore, JsonlHistorySink, LocalStateStore, RemoteStateStore,
};

/// Object store selected by configuration.
pub fn build_object_store(cfg: &ObjectStoreConfig) -> Arc<dyn ObjectStore> {
    match cfg {
        ObjectStoreConfig::InMemory => Arc::new(InMemoryObjectStore::new()),
        ObjectStoreConfig::Filesystem { root } => Arc::new(FileSystemObjectStore::new(root.clone())),
    }
}

/// Local store, wrapped in the remote tier when a remote location is set.
pub fn build_state_store(cfg: &SchedulerConfig) -> Result<Arc<dyn StateStore>, SchedulerError> {
    let local = LocalStateStore::new(cfg.state_path.clone());
    let location = cfg.remote_location().map_err(SchedulerError::Validation)?;
    Ok(match location {
        Some(location) => {
            tracing::info!("remote state tier enabled at {}", location);
            let objects = build_object_store(&cfg.object_store);
            Arc::new(RemoteStateStore::new(local, objects, location))
        }
        None => Arc::new(local),
    })
}

/// History recorder over the configured sink.
pub fn build_history(cfg: &HistoryBackendConfig) -> Result<TaskHistory, SchedulerError> {
    Ok(match cfg {
        HistoryBackendConfig::InMemory => TaskHistory::in_memory(),
        HistoryBackendConfig::File { path } => TaskHistory::new(Box::new(JsonlHistorySink::open(path)?)),
    })
}

/// Error capture middleware for the RPC layer. Static context from the
/// configuration is attached to every report.
pub fn build_error_capture(cfg: &SchedulerConfig, reporter: Arc<dyn ErrorReporter>) -> ErrorCapture {
    let capture = ErrorCapture::new(reporter, cfg.error_reporting.enabled);
    if cfg.error_reporting.context.is_empty() {
        return capture;
    }
    let context: CallContext = cfg.error_reporting.context.clone();
    let provider: ContextProvider = Arc::new(move |_| context.clone());
    capture.with_context_provider(provider)
}

/// Compose a scheduler from configuration and bootstrap it from its store.
///
/// Fails if the configuration is invalid or the persisted state cannot be
/// loaded; the scheduler must not serve from a known-bad state.
pub async fn build_scheduler(cfg: &SchedulerConfig) -> AppResult<Arc<Scheduler>> {
    cfg.validate()
        .map_err(|e| anyhow::anyhow!("config invalid: {e}"))?;

    let store = build_state_store(cfg).context("failed to build state store")?;
    let history = build_history(&cfg.history).context("failed to open task history")?;
    let scheduler = Arc::new(Scheduler::new(cfg.policy(), store, history));

    let loaded = scheduler
        .bootstrap()
        .await
        .with_context(|| format!("failed to bootstrap from {}", cfg.state_path.display()))?;
    tracing::info!("scheduler ready with {} tasks", loaded);
    Ok(scheduler)
}
