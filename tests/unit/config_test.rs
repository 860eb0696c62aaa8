//! Tests for configuration parsing and validation

use prometheus_central_scheduler::config::{HistoryBackendConfig, SchedulerConfig};

#[test]
fn test_empty_json_uses_defaults() {
    let cfg = SchedulerConfig::from_json_str("{}").unwrap();
    assert_eq!(cfg, SchedulerConfig::default());
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.retention_secs, 600);
    assert!(cfg.remote_state_path.is_none());
}

#[test]
fn test_zero_intervals_rejected() {
    for field in ["checkpoint_interval_secs", "prune_interval_secs", "worker_disconnect_secs"] {
        let json = format!("{{\"{field}\": 0}}");
        let err = SchedulerConfig::from_json_str(&json).unwrap_err();
        assert!(err.contains(field), "{err}");
    }
}

#[test]
fn test_empty_state_path_rejected() {
    let cfg = SchedulerConfig {
        state_path: "".into(),
        ..SchedulerConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_malformed_remote_path_rejected() {
    let cfg = SchedulerConfig {
        remote_state_path: Some("not-a-url".into()),
        ..SchedulerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("remote_state_path"));
}

#[test]
fn test_parse_error_reported() {
    let err = SchedulerConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_from_env_overrides_defaults() {
    std::env::set_var("SCHEDULER_MAX_RETRIES", "7");
    std::env::set_var("SCHEDULER_HISTORY_PATH", "/tmp/history.jsonl");
    let cfg = SchedulerConfig::from_env();
    std::env::remove_var("SCHEDULER_MAX_RETRIES");
    std::env::remove_var("SCHEDULER_HISTORY_PATH");

    let cfg = cfg.unwrap();
    assert_eq!(cfg.max_retries, 7);
    assert_eq!(
        cfg.history,
        HistoryBackendConfig::File {
            path: "/tmp/history.jsonl".into()
        }
    );
}
