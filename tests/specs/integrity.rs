//! Cross-cutting integrity properties.

use crate::prelude::Rig;
use fm_adapters::{
    AdapterRegistry, FakeToolAdapter, OutputKind, Provider, ToolAdapter, ToolResult, ToolRuntime,
    ToolStatus, ToolTask,
};
use fm_core::{RunMode, TaskStatus, WorkItem, WorkItemId};
use fm_gates::can_pause_at;
use std::sync::Arc;

/// Every observed status transition in a full run is a legal edge of the
/// state machine, and only one runner spawn is recorded.
#[tokio::test]
async fn observed_transitions_are_all_legal_edges() {
    let rig = Rig::new();
    rig.create_task("t-legal", RunMode::Autonomous);
    rig.pipeline.push_plan(
        vec![WorkItem::new(WorkItemId::new("wi-1"), "work")],
        None,
    );
    rig.runner().run("t-legal").await.unwrap();

    let mut current = TaskStatus::Created;
    for entry in rig.store.list_audit("t-legal").unwrap() {
        if entry.event_type != "status_changed" {
            continue;
        }
        let to: TaskStatus =
            serde_json::from_value(entry.payload["to"].clone()).expect("parseable status");
        assert!(
            current.can_transition_to(to),
            "illegal edge {current} -> {to} observed in audit"
        );
        current = to;
    }
    assert!(current.is_terminal());

    let spawns = rig
        .store
        .list_lineage("t-legal", Some(fm_core::LineageKind::RunnerSpawn))
        .unwrap();
    assert_eq!(spawns.len(), 1, "exactly one runner per task");
}

/// The pause red line, end to end: only open_plan, and only for
/// interactive/assisted.
#[test]
fn pause_gate_red_line() {
    for mode in [RunMode::Interactive, RunMode::Assisted] {
        assert!(can_pause_at("open_plan", mode).unwrap());
    }
    assert!(!can_pause_at("open_plan", RunMode::Autonomous).unwrap());
    for checkpoint in ["pre_commit", "post_plan", ""] {
        assert!(can_pause_at(checkpoint, RunMode::Interactive).is_err());
    }
}

/// Diff-only invariant: a result claiming a diff must carry a parseable
/// non-empty one, and no persisted result declares a tree mutation.
#[tokio::test]
async fn diff_only_invariant_holds_at_the_runtime_boundary() {
    let runtime = ToolRuntime::default();
    let fake = FakeToolAdapter::new("probe");
    let adapter: Arc<dyn ToolAdapter> = Arc::new(fake.clone());
    let task = ToolTask::new("t-diff", "change something", std::env::temp_dir());

    // Empty diff with output_kind=diff: rejected.
    let mut empty = ToolResult::empty("probe", "r1", Provider::Local);
    empty.status = ToolStatus::Success;
    empty.output_kind = OutputKind::Diff;
    fake.push_result(empty);
    let rejected = runtime.run(&adapter, &task, false).await.unwrap();
    assert_eq!(rejected.status, ToolStatus::Failed);
    assert!(!rejected.diff_validation.unwrap().is_valid);

    // A tool claiming it committed: rejected, declaration reset.
    let mut wrote = FakeToolAdapter::default_result("probe", &task);
    wrote.committed = true;
    fake.push_result(wrote);
    let rejected = runtime.run(&adapter, &task, false).await.unwrap();
    assert_eq!(rejected.status, ToolStatus::Failed);
    assert!(!rejected.committed && !rejected.wrote_files);

    // A proper diff passes and carries validation evidence.
    let passed = runtime.run(&adapter, &task, false).await.unwrap();
    assert_eq!(passed.status, ToolStatus::Success);
    assert!(passed.diff_validation.unwrap().is_valid);
    assert!(!passed.wrote_files && !passed.committed);
}

/// Tool-ledger dedup: identical fingerprints in the same task scope share
/// one entry; the second call replays.
#[tokio::test]
async fn identical_tool_calls_replay_from_the_ledger() {
    let rig = Rig::new();
    let ledger = fm_engine::ToolLedger::new(rig.store.clone(), fm_core::SystemClock);
    let fingerprint = ToolTask::new("t-led", "same call", std::env::temp_dir())
        .fingerprint("claude-cli");

    let mut executions = 0;
    for expect_replay in [false, true] {
        let (result, exit, replayed) = ledger
            .execute_or_replay("t-led", &fingerprint, || async {
                Ok((serde_json::json!({"diff": "--- a\n+++ b\n@@ -1 +1 @@\n-x\n+y\n"}), 0))
            })
            .await
            .unwrap();
        if !replayed {
            executions += 1;
        }
        assert_eq!(exit, 0);
        assert!(result["diff"].as_str().unwrap().contains("@@"));
        assert_eq!(replayed, expect_replay);
    }
    assert_eq!(executions, 1);
    assert_eq!(rig.store.tool_ledger_count("t-led").unwrap(), 1);
}

/// Decision records stay sealed: recomputation matches storage, and a
/// mutated record fails the sweep.
#[tokio::test]
async fn decision_ledger_is_tamper_evident() {
    let rig = Rig::new();
    rig.store
        .create_task(
            &fm_core::TaskId::new("t-seal"),
            "sealed",
            RunMode::Assisted,
            crate::prelude::now_ms(),
        )
        .unwrap();
    rig.bus.emit(&fm_core::Event::task(
        fm_core::EventKind::TaskCreated,
        "t-seal",
        chrono::Utc::now().to_rfc3339(),
        serde_json::Map::new(),
    ));
    rig.supervisor.process_available().unwrap();

    assert!(rig.store.verify_decision_integrity().unwrap().is_empty());
    let decision = &rig.store.list_decisions(Some("t-seal"), 1).unwrap()[0];
    assert_eq!(decision.compute_hash(), decision.record_hash);
}

/// The route planner falls back when the primary adapter is unhealthy,
/// and the reroute is evented with its reason code.
#[tokio::test]
async fn unhealthy_primary_triggers_a_reroute() {
    let rig = Rig::new();
    let registry: &AdapterRegistry = &rig.registry;
    let sick = FakeToolAdapter::new("primary-cli");
    sick.set_health(fm_adapters::ToolHealth::failed(
        fm_adapters::HealthState::Unreachable,
        "connection refused",
    ));
    registry.register(Arc::new(sick));
    registry.register(Arc::new(FakeToolAdapter::new("fallback-cli")));

    let task = rig.create_task("t-route", RunMode::Autonomous);
    let mut metadata = task.metadata.clone();
    metadata.route_plan = Some(fm_core::RoutePlan::new(
        "primary-cli",
        vec!["fallback-cli".to_string()],
    ));
    rig.store
        .set_task_metadata("t-route", &metadata, crate::prelude::now_ms())
        .unwrap();
    rig.pipeline.push_plan(vec![], None);

    rig.runner().run("t-route").await.unwrap();

    let task = rig.store.get_task("t-route").unwrap().unwrap();
    let plan = task.metadata.route_plan.unwrap();
    assert_eq!(plan.primary, "fallback-cli");
    assert!(plan.verified_at.is_some());

    let audit = rig.store.list_audit("t-route").unwrap();
    let reroute = audit
        .iter()
        .find(|a| a.event_type == "task_rerouted")
        .expect("reroute audited");
    assert_eq!(reroute.payload["from"], "primary-cli");
    assert_eq!(reroute.payload["to"], "fallback-cli");
    assert_eq!(reroute.payload["reason"], "provider_unreachable");
}
