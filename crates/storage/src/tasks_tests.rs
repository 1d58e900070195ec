// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;
use fm_core::test_support;

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    (dir, store)
}

#[test]
fn upsert_is_idempotent_by_task_id() {
    let (_dir, store) = temp_store();
    let mut task = test_support::task("t-1", RunMode::Assisted);
    store.upsert_task(&task).unwrap();
    store.upsert_task(&task).unwrap();
    assert_eq!(store.list_tasks().unwrap().len(), 1);

    task.title = "renamed".to_string();
    store.upsert_task(&task).unwrap();
    assert_eq!(store.get_task("t-1").unwrap().unwrap().title, "renamed");
}

#[test]
fn status_updates_follow_the_machine() {
    let (_dir, store) = temp_store();
    let task = store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Assisted, 0)
        .unwrap();
    assert_eq!(task.status, TaskStatus::Created);

    store
        .update_task_status("t-1", TaskStatus::IntentProcessing, 1)
        .unwrap();
    store.update_task_status("t-1", TaskStatus::Planning, 2).unwrap();

    let err = store
        .update_task_status("t-1", TaskStatus::Verifying, 3)
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalTransition { .. }));
}

#[test]
fn terminal_rows_reject_status_mutation_but_accept_exit_reason() {
    let (_dir, store) = temp_store();
    store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Assisted, 0)
        .unwrap();
    store.update_task_status("t-1", TaskStatus::Failed, 1).unwrap();

    let err = store
        .update_task_status("t-1", TaskStatus::Planning, 2)
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalTransition { .. }));

    store
        .update_exit_reason("t-1", ExitReason::FatalError, 3)
        .unwrap();
    let task = store.get_task("t-1").unwrap().unwrap();
    assert_eq!(task.exit_reason, Some(ExitReason::FatalError));
}

#[test]
fn metadata_updates_roundtrip() {
    let (_dir, store) = temp_store();
    let task = store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Autonomous, 0)
        .unwrap();
    let mut metadata = task.metadata.clone();
    metadata.gates = vec!["doctor".into(), "tests".into()];
    metadata.retry_count = 2;
    store.set_task_metadata("t-1", &metadata, 5).unwrap();

    let loaded = store.get_task("t-1").unwrap().unwrap();
    assert_eq!(loaded.metadata.gates.len(), 2);
    assert_eq!(loaded.metadata.retry_count, 2);
    assert_eq!(loaded.updated_at_ms, 5);
}

#[test]
fn missing_task_reads_return_none() {
    let (_dir, store) = temp_store();
    assert!(store.get_task("nope").unwrap().is_none());
    let err = store
        .update_exit_reason("nope", ExitReason::Done, 0)
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}
