//! Worker-facing API surface and the background timer service.

pub mod api;
pub mod service;

pub use api::{
    DoneResponse, Health, RegisterRequest, ReportRequest, RpcError, RpcHandler, TaskStatusResponse,
    WorkRequest, WorkResponse,
};
pub use service::{SchedulerService, TimerSettings};
