// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    (dir, store)
}

#[test]
fn audit_preserves_insertion_order() {
    let (_dir, store) = temp_store();
    let task_id = TaskId::new("t-1");
    for (i, event_type) in ["created", "planning", "executing"].iter().enumerate() {
        store
            .audit(
                &task_id,
                format!("2026-01-01T00:00:0{i}Z"),
                AuditLevel::Info,
                event_type,
                serde_json::json!({}),
            )
            .unwrap();
    }
    let entries = store.list_audit("t-1").unwrap();
    assert_eq!(
        entries.iter().map(|e| e.event_type.as_str()).collect::<Vec<_>>(),
        vec!["created", "planning", "executing"]
    );
}

#[test]
fn audit_is_task_scoped() {
    let (_dir, store) = temp_store();
    store
        .audit(&TaskId::new("t-1"), "ts".into(), AuditLevel::Warn, "x", serde_json::json!({}))
        .unwrap();
    assert!(store.list_audit("t-2").unwrap().is_empty());
}

#[test]
fn lineage_filters_by_kind() {
    let (_dir, store) = temp_store();
    let task_id = TaskId::new("t-1");
    store
        .append_lineage(&LineageEntry::new(task_id.clone(), LineageKind::RunnerSpawn, "pid-1", "created"))
        .unwrap();
    store
        .append_lineage(&LineageEntry::new(task_id.clone(), LineageKind::Commit, "abc", "executing"))
        .unwrap();
    store
        .append_lineage(&LineageEntry::new(task_id.clone(), LineageKind::Commit, "def", "executing"))
        .unwrap();

    let commits = store.list_lineage("t-1", Some(LineageKind::Commit)).unwrap();
    assert_eq!(commits.len(), 2);
    let all = store.list_lineage("t-1", None).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn empty_trails_read_as_empty() {
    let (_dir, store) = temp_store();
    assert!(store.list_audit("none").unwrap().is_empty());
    assert!(store.list_lineage("none", None).unwrap().is_empty());
}
