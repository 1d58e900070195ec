// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::TaskId;

#[test]
fn audit_level_wire_names() {
    assert_eq!(AuditLevel::Info.to_string(), "info");
    assert_eq!(AuditLevel::Warn.to_string(), "warn");
    assert_eq!(AuditLevel::Error.to_string(), "error");
}

#[test]
fn lineage_kind_covers_every_link() {
    let kinds = [
        (LineageKind::Pipeline, "pipeline"),
        (LineageKind::RunnerSpawn, "runner_spawn"),
        (LineageKind::RunnerExit, "runner_exit"),
        (LineageKind::PauseCheckpoint, "pause_checkpoint"),
        (LineageKind::ExecutionRequest, "execution_request"),
        (LineageKind::Artifact, "artifact"),
        (LineageKind::Commit, "commit"),
        (LineageKind::GateResult, "gate_result"),
    ];
    for (kind, name) in kinds {
        assert_eq!(kind.as_str(), name);
    }
}

#[test]
fn lineage_builder_attaches_metadata() {
    let entry = LineageEntry::new(TaskId::new("t-1"), LineageKind::Commit, "abc123", "executing")
        .with_metadata(serde_json::json!({"branch": "main"}));
    assert_eq!(entry.ref_id, "abc123");
    assert_eq!(entry.phase, "executing");
    assert_eq!(entry.metadata["branch"], "main");
}

#[test]
fn audit_entry_serde_roundtrip() {
    let entry = AuditEntry {
        task_id: TaskId::new("t-1"),
        ts: "2026-01-01T00:00:00Z".to_string(),
        level: AuditLevel::Warn,
        event_type: "timeout_warning".to_string(),
        payload: serde_json::json!({"elapsed_ms": 1000}),
    };
    let json = serde_json::to_string(&entry).unwrap();
    let parsed: AuditEntry = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, entry);
}
