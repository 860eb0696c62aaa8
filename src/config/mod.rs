//! Configuration models for the scheduler, its backends and its timers.

pub mod scheduler;

pub use scheduler::{
    ErrorReportingConfig, HistoryBackendConfig, ObjectStoreConfig, SchedulerConfig,
};
