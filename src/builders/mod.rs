//! Builders to construct a scheduler and its backends from configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{
    build_error_capture, build_history, build_object_store, build_scheduler, build_state_store,
};
