//! Supervisor behavior over the assembled system.

use crate::prelude::Rig;
use fm_core::{Event, EventKind, RunMode, TaskStatus};
use serde_json::Map;

fn created_event(task_id: &str) -> Event {
    Event::task(
        EventKind::TaskCreated,
        task_id,
        chrono::Utc::now().to_rfc3339(),
        Map::new(),
    )
}

/// Publishing the same logical event five times yields exactly one inbox
/// row, one policy evaluation, and one decision record.
#[tokio::test]
async fn duplicate_events_collapse_to_one_decision() {
    let rig = Rig::new();
    rig.store
        .create_task(
            &fm_core::TaskId::new("t5"),
            "dedup probe",
            RunMode::Assisted,
            crate::prelude::now_ms(),
        )
        .unwrap();

    for _ in 0..5 {
        rig.bus.emit(&created_event("t5"));
    }
    assert_eq!(rig.store.inbox_row_count().unwrap(), 1);

    let processed = rig.supervisor.process_available().unwrap();
    assert_eq!(processed, 1);

    let decisions = rig.store.list_decisions(Some("t5"), 10).unwrap();
    assert_eq!(decisions.len(), 1);
    assert!(decisions[0].verify_integrity().is_ok());
}

/// The poller recovers events the bus never carried, so a supervisor that
/// was offline still sees every task.
#[tokio::test]
async fn polling_backfills_missed_events() {
    let rig = Rig::new();
    // Created directly against the store, no bus emission at all.
    rig.store
        .create_task(
            &fm_core::TaskId::new("t6"),
            "quiet task",
            RunMode::Assisted,
            crate::prelude::now_ms(),
        )
        .unwrap();

    assert_eq!(rig.store.inbox_row_count().unwrap(), 0);
    rig.supervisor.poll_sources().unwrap();
    assert_eq!(rig.store.inbox_row_count().unwrap(), 1);

    rig.supervisor.process_available().unwrap();
    assert_eq!(rig.store.list_decisions(Some("t6"), 10).unwrap().len(), 1);
}

/// A blocking policy verdict lands atomically: blocked status, decision
/// record, and audit link all present.
#[tokio::test]
async fn high_risk_task_is_blocked_on_creation() {
    let rig = Rig::new();
    rig.store
        .create_task(
            &fm_core::TaskId::new("t7"),
            "risky",
            RunMode::Assisted,
            crate::prelude::now_ms(),
        )
        .unwrap();

    let mut payload = Map::new();
    payload.insert(
        "risk_matrix".to_string(),
        serde_json::json!({"security": "critical"}),
    );
    rig.bus.emit(&Event::task(
        EventKind::TaskCreated,
        "t7",
        chrono::Utc::now().to_rfc3339(),
        payload,
    ));
    rig.supervisor.process_available().unwrap();

    let task = rig.store.get_task("t7").unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Blocked);

    let decisions = rig.store.list_decisions(Some("t7"), 10).unwrap();
    assert_eq!(decisions[0].outputs["verdict"], "BLOCK");
    assert_eq!(decisions[0].final_verdict, fm_core::GovernanceVerdict::Block);

    let audit = rig.store.list_audit("t7").unwrap();
    assert!(audit.iter().any(|a| a.event_type == "supervisor_decision"));
}

/// Backlog metrics track the pending queue and its oldest age.
#[tokio::test]
async fn backlog_metrics_reflect_queue_depth() {
    let rig = Rig::new();
    for i in 0..3 {
        rig.bus.emit(&created_event(&format!("t-backlog-{i}")));
    }

    let metrics = rig.supervisor.backlog().unwrap();
    assert_eq!(metrics.pending, 3);
    assert!(metrics.oldest_pending_age_seconds.is_some());

    rig.supervisor.process_available().unwrap();
    let metrics = rig.supervisor.backlog().unwrap();
    assert_eq!(metrics.pending, 0);
    assert_eq!(metrics.completed, 3);
}
