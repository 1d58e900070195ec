//! End-to-end task lifecycle scenarios.

use crate::prelude::Rig;
use fm_core::{ExitReason, RunMode, TaskStatus, WorkItem, WorkItemId};
use fm_engine::ScriptedPlan;
use fm_gates::DoneGateRunner;
use std::time::Duration;

fn items(ids: &[&str]) -> Vec<WorkItem> {
    ids.iter()
        .map(|id| WorkItem::new(WorkItemId::new(*id), format!("item {id}")))
        .collect()
}

/// Happy path: assisted task, two work items, doctor gate, full artifact
/// set on disk and a clean audit trail.
#[tokio::test]
async fn assisted_task_runs_to_succeeded() {
    let rig = Rig::new();
    rig.create_task("t1", RunMode::Assisted);
    rig.pipeline.push_plan(items(&["wi-1", "wi-2"]), Some("open_plan"));

    let approver = rig.runner();
    let runner = rig.runner();
    let run = tokio::spawn(async move { runner.run("t1").await });

    assert!(rig.wait_for_status("t1", TaskStatus::AwaitingApproval).await);
    approver.approve("t1").unwrap();

    let exit = run.await.unwrap().unwrap();
    assert_eq!(exit, ExitReason::Done);

    let task = rig.store.get_task("t1").unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Succeeded);
    assert_eq!(task.exit_reason, Some(ExitReason::Done));

    // Status trail through the audit stream.
    let trail: Vec<String> = rig
        .store
        .list_audit("t1")
        .unwrap()
        .into_iter()
        .filter(|a| a.event_type == "status_changed")
        .map(|a| a.payload["to"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        trail,
        vec![
            "intent_processing",
            "planning",
            "awaiting_approval",
            "executing",
            "verifying",
            "succeeded",
        ]
    );

    // Full artifact set.
    let dir = rig.artifacts_root().join("t1");
    for artifact in [
        "open_plan.json",
        "work_item_wi-1.json",
        "work_item_wi-2.json",
        "work_items_summary.json",
        "gate_results.json",
    ] {
        assert!(dir.join(artifact).exists(), "missing {artifact}");
    }
    let gate_results: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("gate_results.json")).unwrap())
            .unwrap();
    assert_eq!(gate_results["overall_status"], "passed");

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.join("work_items_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(summary["completed"], 2);
}

/// Autonomous tasks never pause: reaching the open_plan checkpoint is the
/// red line and the task ends blocked.
#[tokio::test]
async fn autonomous_task_is_blocked_at_the_pause_point() {
    let rig = Rig::new();
    rig.create_task("t2", RunMode::Autonomous);
    rig.pipeline.push_plan(items(&["wi-1"]), Some("open_plan"));

    let exit = rig.runner().run("t2").await.unwrap();
    assert_eq!(exit, ExitReason::Blocked);

    let task = rig.store.get_task("t2").unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Blocked);
    assert_eq!(task.exit_reason, Some(ExitReason::Blocked));

    let audit = rig.store.list_audit("t2").unwrap();
    let blocked = audit
        .iter()
        .find(|a| a.event_type == "autonomous_blocked")
        .expect("red line audit entry");
    assert_eq!(
        blocked.payload["message"],
        "AUTONOMOUS mode task blocked: Cannot proceed without approval checkpoint"
    );
}

/// Gate failure feeds back into planning; the second round passes.
#[tokio::test]
async fn failing_gate_forces_a_replan_then_passes() {
    let rig = Rig::new();
    let task = rig.create_task("t3", RunMode::Autonomous);
    let mut metadata = task.metadata.clone();
    metadata.gates = vec!["doctor".to_string(), "tests".to_string()];
    rig.store
        .set_task_metadata("t3", &metadata, crate::prelude::now_ms())
        .unwrap();

    rig.pipeline.push_plan(items(&["wi-1"]), None);
    rig.pipeline.push_plan(items(&["wi-2"]), None);

    let marker = rig.dir.path().join("tests_fixed");
    let mut gates = DoneGateRunner::new(rig.dir.path().to_path_buf());
    gates.register_gate(
        "tests",
        vec![
            "sh".to_string(),
            "-c".to_string(),
            format!(
                "if [ -f {m} ]; then echo all green; else touch {m}; echo 2 failed >&2; exit 1; fi",
                m = marker.display()
            ),
        ],
    );

    let exit = rig.runner().with_gate_runner(gates).run("t3").await.unwrap();
    assert_eq!(exit, ExitReason::Done);
    assert_eq!(
        rig.store.get_task("t3").unwrap().unwrap().status,
        TaskStatus::Succeeded
    );

    // Two planning phases in the audit stream.
    let planning_rounds = rig
        .store
        .list_audit("t3")
        .unwrap()
        .iter()
        .filter(|a| {
            a.event_type == "status_changed" && a.payload["to"] == "planning"
        })
        .count();
    assert_eq!(planning_rounds, 2);

    // Two gate-result artifacts in sequence.
    let dir = rig.artifacts_root().join("t3");
    assert!(dir.join("gate_results_attempt_1.json").exists());
    assert!(dir.join("gate_results_attempt_2.json").exists());

    // The failure context reached the second planning round.
    let failure_audit = rig
        .store
        .list_audit("t3")
        .unwrap()
        .iter()
        .any(|a| a.event_type == "gate_failed" && a.payload["gate"] == "tests");
    assert!(failure_audit);
}

/// Hard timeout: a planner that sleeps past the limit fails the task with
/// a warning logged before the terminal error.
#[tokio::test]
async fn slow_planning_hits_the_hard_timeout() {
    let rig = Rig::new();
    let task = rig.create_task("t4", RunMode::Autonomous);
    let mut metadata = task.metadata.clone();
    metadata.timeout.warning_ms = 200;
    metadata.timeout.hard_ms = 600;
    rig.store
        .set_task_metadata("t4", &metadata, crate::prelude::now_ms())
        .unwrap();

    rig.pipeline.push_scripted(ScriptedPlan {
        outcome: Ok(fm_engine::PlanOutcome {
            summary: "never delivered".to_string(),
            stages: vec![],
            work_items: vec![],
            pause_checkpoint: None,
        }),
        delay: Duration::from_secs(10),
    });

    let exit = rig.runner().run("t4").await.unwrap();
    assert_eq!(exit, ExitReason::Timeout);

    let task = rig.store.get_task("t4").unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.exit_reason, Some(ExitReason::Timeout));

    let audit = rig.store.list_audit("t4").unwrap();
    let warning = audit.iter().position(|a| a.event_type == "timeout_warning");
    let error = audit.iter().position(|a| a.event_type == "timeout_exceeded");
    assert!(warning.unwrap() < error.unwrap());
}

/// Checkpoint recovery: a verified planning_complete checkpoint advances
/// straight to executing without re-running the planning pipeline.
#[tokio::test]
async fn restart_resumes_from_a_verified_checkpoint() {
    let rig = Rig::new();
    rig.create_task("t5", RunMode::Autonomous);
    for status in [TaskStatus::IntentProcessing, TaskStatus::Planning] {
        rig.store
            .update_task_status("t5", status, crate::prelude::now_ms())
            .unwrap();
    }

    let plan_path = rig.artifacts_root().join("t5").join("open_plan.json");
    std::fs::create_dir_all(plan_path.parent().unwrap()).unwrap();
    std::fs::write(&plan_path, "{}").unwrap();
    rig.store
        .append_checkpoint(
            "cp-1",
            "t5",
            "planning_complete",
            &serde_json::json!({"work_items": [{"id": "wi-9", "title": "carried over"}]}),
            &fm_core::EvidencePack::require_all(vec![fm_core::Evidence::ArtifactExists {
                path: plan_path.to_string_lossy().into_owned(),
                artifact_type: "json".to_string(),
            }]),
            None,
            "ts",
        )
        .unwrap();

    let exit = rig.runner().run("t5").await.unwrap();
    assert_eq!(exit, ExitReason::Done);
    assert_eq!(rig.pipeline.plan_calls(), 0);

    let audit = rig.store.list_audit("t5").unwrap();
    assert!(audit
        .iter()
        .any(|a| a.event_type == "recovery_resumed_from_checkpoint"));
}
