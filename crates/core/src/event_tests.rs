// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    task_created = { EventKind::TaskCreated, "task.created" },
    task_rerouted = { EventKind::TaskRerouted, "task.rerouted" },
    step_completed = { EventKind::StepCompleted, "step.completed" },
    mode_violation = { EventKind::ModeViolation, "mode.violation" },
    recovery = { EventKind::RecoveryResumed, "recovery.resumed_from_checkpoint" },
)]
fn kind_names_are_dotted(kind: EventKind, name: &str) {
    assert_eq!(kind.name(), name);
    assert_eq!(EventKind::parse(name), kind);
}

#[test]
fn unknown_kind_parses_to_custom() {
    let kind = EventKind::parse("billing.invoiced");
    assert_eq!(kind, EventKind::Custom("billing.invoiced".to_string()));
    assert_eq!(kind.name(), "billing.invoiced");
}

#[test]
fn task_event_has_core_source_and_task_entity() {
    let event = Event::task(
        EventKind::TaskProgress,
        "t-1",
        "2026-01-01T00:00:00Z".to_string(),
        Map::new(),
    );
    assert_eq!(event.source, EventSource::Core);
    assert_eq!(event.entity.kind, "task");
    assert_eq!(event.task_id(), Some("t-1"));
}

#[test]
fn non_task_entity_has_no_task_id() {
    let event = Event {
        kind: EventKind::Custom("mcp.health".to_string()),
        ts: "2026-01-01T00:00:00Z".to_string(),
        source: EventSource::Core,
        entity: EntityRef::server("srv-1"),
        payload: Map::new(),
    };
    assert_eq!(event.task_id(), None);
}

#[test]
fn dedupe_key_is_stable_for_identical_events() {
    let a = Event::task(
        EventKind::TaskCreated,
        "t-5",
        "2026-01-01T00:00:00Z".to_string(),
        Map::new(),
    );
    let b = Event::task(
        EventKind::TaskCreated,
        "t-5",
        "2026-01-02T09:30:00Z".to_string(),
        Map::new(),
    );
    // Same logical fact at different times keys identically.
    assert_eq!(a.dedupe_key(), b.dedupe_key());
    assert_eq!(a.dedupe_key(), "task.created:t-5");
}

#[test]
fn dedupe_key_discriminates_repeatable_events() {
    let mut payload = Map::new();
    payload.insert("step".to_string(), serde_json::json!("planning"));
    payload.insert("attempt".to_string(), serde_json::json!(2));
    let event = Event::task(
        EventKind::StepCompleted,
        "t-5",
        "2026-01-01T00:00:00Z".to_string(),
        payload,
    );
    assert_eq!(event.dedupe_key(), "step.completed:t-5:planning:2");
}

#[test]
fn event_serde_roundtrip_uses_type_tag() {
    let event = Event::task(
        EventKind::GateFailed,
        "t-2",
        "2026-01-01T00:00:00Z".to_string(),
        Map::new(),
    );
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("type").is_some());
    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}
