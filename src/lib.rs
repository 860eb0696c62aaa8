//! # Prometheus Central Scheduler
//!
//! A central scheduler for DAG-structured task pipelines. Workers register
//! tasks with their dependencies, poll for ready work and report outcomes;
//! the scheduler owns the task state table, retries failures within a
//! budget, prunes finished graphs and checkpoints its state so a restart
//! resumes where it left off.
//!
//! ## Persistence
//!
//! State is a single versioned snapshot written through a [`core::StateStore`]:
//!
//! - **Local disk**: atomic write-then-rename at a fixed path.
//! - **Remote-backed**: the local store is used as a staging buffer and
//!   mirrored to an object store (`scheme://bucket/key`). On boot the remote
//!   copy wins when it exists; otherwise local state is used.
//!
//! A snapshot that cannot be decoded is fatal at bootstrap. The scheduler
//! never serves from state it cannot trust.
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_central_scheduler::builders::{build_error_capture, build_scheduler};
//! use prometheus_central_scheduler::config::SchedulerConfig;
//! use prometheus_central_scheduler::core::TracingReporter;
//! use prometheus_central_scheduler::runtime::{RpcHandler, SchedulerService, TimerSettings, WorkRequest};
//! use std::sync::Arc;
//!
//! let cfg = SchedulerConfig::from_env()?;
//! let scheduler = build_scheduler(&cfg).await?;
//! let service = SchedulerService::start(scheduler.clone(), TimerSettings::from_config(&cfg));
//! let rpc = RpcHandler::new(scheduler, build_error_capture(&cfg, Arc::new(TracingReporter)));
//!
//! let work = rpc.request_work(&WorkRequest { worker_id: "worker-1".into() })?;
//! // ... run the task, then report_done / report_failed ...
//!
//! service.shutdown().await?;
//! ```
//!
//! See `tests/scheduler_scenarios_test.rs` for end-to-end flows.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Task model, task state table, scheduler and error taxonomy.
pub mod core;
/// Configuration models for the scheduler and its backends.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for state stores, object stores and history.
pub mod infra;
/// Worker-facing API surface and timer service.
pub mod runtime;
/// Shared utilities.
pub mod util;
