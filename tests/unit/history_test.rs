//! Tests for task history recording

use prometheus_central_scheduler::core::{TaskHistory, TaskStatus};
use prometheus_central_scheduler::infra::JsonlHistorySink;

#[test]
fn test_history_entries_are_chronological() {
    let history = TaskHistory::in_memory();
    history.record("a", None, TaskStatus::Pending, None);
    history.record("a", Some(TaskStatus::Pending), TaskStatus::Running, Some("w1"));
    history.record("a", Some(TaskStatus::Running), TaskStatus::Failed, Some("w1"));
    history.record("a", Some(TaskStatus::Failed), TaskStatus::Pending, None);

    let entries = history.query("a");
    assert_eq!(entries.len(), 4);
    assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
    assert_eq!(entries[0].previous, None);
    assert_eq!(entries[2].new, TaskStatus::Failed);
    assert!(history.query("unknown").is_empty());
}

#[test]
fn test_jsonl_history_resumes_read_after_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlHistorySink::open(dir.path().join("logs/history.jsonl")).unwrap();
    let history = TaskHistory::new(Box::new(sink));

    history.record("a", None, TaskStatus::Pending, None);
    let cursor = history.query("a").last().map(|e| e.seq);
    history.record("a", Some(TaskStatus::Pending), TaskStatus::Running, Some("w1"));

    let rest = history.query_from("a", cursor);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].new, TaskStatus::Running);

    let written = std::fs::read_to_string(dir.path().join("logs/history.jsonl")).unwrap();
    assert_eq!(written.lines().count(), 2);
}
