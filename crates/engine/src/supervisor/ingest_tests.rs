// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::supervisor::{Supervisor, SupervisorConfig};
use fm_core::test_support::{task_event, task_event_with};
use fm_core::{FakeClock, RunMode, SequentialIdGen, TaskId, TaskStatus};
use fm_storage::Store;

fn supervisor() -> (
    tempfile::TempDir,
    Store,
    Arc<Supervisor<FakeClock, SequentialIdGen>>,
) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    let supervisor = Arc::new(Supervisor::new(
        store.clone(),
        FakeClock::new(),
        SequentialIdGen::new("dec"),
        SupervisorConfig::default(),
    ));
    (dir, store, supervisor)
}

#[test]
fn bus_events_convert_with_dedupe_key_identity() {
    let event = task_event_with(
        EventKind::StepCompleted,
        "t-1",
        &[("step", serde_json::json!("planning"))],
    );
    let converted = supervisor_event(&event, EventSourceTag::Eventbus);
    assert_eq!(converted.event_id, "step.completed:t-1:planning");
    assert_eq!(converted.task_id, "t-1");
    assert_eq!(converted.event_type, "step.completed");
    assert_eq!(converted.payload["step"], "planning");
}

#[test]
fn repeated_ingest_dedupes() {
    let (_dir, store, supervisor) = supervisor();
    let event = task_event(EventKind::TaskCreated, "t-1");

    assert!(supervisor.ingest_event(&event, EventSourceTag::Eventbus));
    for _ in 0..4 {
        assert!(!supervisor.ingest_event(&event, EventSourceTag::Eventbus));
    }
    assert_eq!(store.inbox_row_count().unwrap(), 1);
}

#[test]
fn attached_bus_feeds_the_inbox() {
    let (_dir, store, supervisor) = supervisor();
    let bus = crate::bus::EventBus::new();
    supervisor.attach(&bus);

    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    bus.emit(&task_event(EventKind::TaskFailed, "t-1"));

    assert_eq!(store.inbox_row_count().unwrap(), 2);
}

#[test]
fn polling_recovers_missed_lifecycle_events() {
    let (_dir, store, supervisor) = supervisor();
    store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Assisted, 0)
        .unwrap();

    // The bus never delivered anything; polling fills the gap.
    let inserted = supervisor.poll_sources().unwrap();
    assert_eq!(inserted, 1);

    // Re-polling inserts nothing new.
    assert_eq!(supervisor.poll_sources().unwrap(), 0);
}

#[test]
fn polling_and_bus_share_dedupe_keys() {
    let (_dir, store, supervisor) = supervisor();
    store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Assisted, 0)
        .unwrap();

    // Fast path first, then the poller sees the same fact.
    supervisor.ingest_event(&task_event(EventKind::TaskCreated, "t-1"), EventSourceTag::Eventbus);
    assert_eq!(supervisor.poll_sources().unwrap(), 0);
    assert_eq!(store.inbox_row_count().unwrap(), 1);
}

#[test]
fn polling_reports_failed_tasks() {
    let (_dir, store, supervisor) = supervisor();
    store
        .create_task(&TaskId::new("t-1"), "demo", RunMode::Assisted, 0)
        .unwrap();
    store
        .update_task_status("t-1", TaskStatus::Failed, 1)
        .unwrap();

    let inserted = supervisor.poll_sources().unwrap();
    // task.created + task.failed
    assert_eq!(inserted, 2);
}
