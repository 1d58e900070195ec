// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{WorkItem, WorkItemId};
use fm_gates::{GateResult, GateRunResult, GateStatus};

fn store() -> (tempfile::TempDir, ArtifactStore) {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(dir.path().join("artifacts"));
    (dir, artifacts)
}

#[test]
fn open_plan_lands_under_task_dir() {
    let (_dir, artifacts) = store();
    let plan = OpenPlanArtifact {
        task_id: "t-1".to_string(),
        generated_at: "ts".to_string(),
        pipeline_status: "completed".to_string(),
        pipeline_summary: "two items".to_string(),
        stages: vec![PlanStage {
            name: "implement".to_string(),
            description: String::new(),
        }],
    };
    let path = artifacts.write_open_plan("t-1", &plan).unwrap();
    assert!(path.ends_with("t-1/open_plan.json"));

    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: OpenPlanArtifact = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, plan);
}

#[test]
fn work_item_artifacts_are_named_by_item_id() {
    let (_dir, artifacts) = store();
    let item = WorkItem::new(WorkItemId::new("wi-7"), "write tests");
    let path = artifacts.write_work_item("t-1", &item).unwrap();
    assert!(path.ends_with("t-1/work_item_wi-7.json"));
}

#[test]
fn summary_counts_statuses() {
    let (_dir, artifacts) = store();
    let mut done = WorkItem::new(WorkItemId::new("wi-1"), "a");
    done.status = fm_core::WorkItemStatus::Completed;
    let mut failed = WorkItem::new(WorkItemId::new("wi-2"), "b");
    failed.status = fm_core::WorkItemStatus::Failed;

    let summary = WorkItemsSummary::from_items("t-1", &[done, failed], "ts".to_string());
    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);

    let path = artifacts.write_summary("t-1", &summary).unwrap();
    assert!(path.ends_with("t-1/work_items_summary.json"));
}

#[test]
fn gate_results_archive_attempts() {
    let (_dir, artifacts) = store();
    let result = GateRunResult {
        task_id: "t-1".to_string(),
        gates_executed: vec![GateResult {
            gate_name: "doctor".to_string(),
            status: GateStatus::Passed,
            exit_code: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
            duration_seconds: 0.1,
            error_message: None,
        }],
        overall_status: GateStatus::Passed,
        total_duration_seconds: 0.1,
        executed_at: "ts".to_string(),
    };

    artifacts.write_gate_results("t-1", &result, 1).unwrap();
    artifacts.write_gate_results("t-1", &result, 2).unwrap();

    let dir = artifacts.task_dir("t-1");
    assert!(dir.join("gate_results.json").exists());
    assert!(dir.join("gate_results_attempt_1.json").exists());
    assert!(dir.join("gate_results_attempt_2.json").exists());
}

#[test]
fn dispatch_command_is_written_verbatim() {
    let (_dir, artifacts) = store();
    let path = artifacts
        .write_dispatch_command("t-1", "#!/bin/sh\necho dispatch\n")
        .unwrap();
    let raw = std::fs::read_to_string(path).unwrap();
    assert!(raw.starts_with("#!/bin/sh"));
}
