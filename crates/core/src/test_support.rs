// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

use crate::event::{Event, EventKind};
use crate::task::{RunMode, Task, TaskId};
use crate::work_item::{WorkItem, WorkItemId};
use serde_json::{Map, Value};

/// A task in `created` status with deterministic timestamps.
pub fn task(id: &str, run_mode: RunMode) -> Task {
    Task::new(TaskId::new(id), format!("task {id}"), run_mode, 1_700_000_000_000)
}

/// A pending work item with no dependencies.
pub fn work_item(id: &str, title: &str) -> WorkItem {
    WorkItem::new(WorkItemId::new(id), title)
}

/// A core-sourced task event with an optional payload.
pub fn task_event(kind: EventKind, task_id: &str) -> Event {
    Event::task(kind, task_id, "2026-01-01T00:00:00Z".to_string(), Map::new())
}

/// A core-sourced task event with the given payload fields.
pub fn task_event_with(kind: EventKind, task_id: &str, fields: &[(&str, Value)]) -> Event {
    let mut payload = Map::new();
    for (k, v) in fields {
        payload.insert((*k).to_string(), v.clone());
    }
    Event::task(kind, task_id, "2026-01-01T00:00:00Z".to_string(), payload)
}
