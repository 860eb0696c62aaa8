//! Tests for clock and telemetry helpers

use std::time::Duration;

use prometheus_central_scheduler::util::{duration_ms, init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 0);
}

#[test]
fn test_duration_ms() {
    assert_eq!(duration_ms(Duration::from_secs(2)), 2_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized");
}
