// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::supervisor::policy::PolicyVerdict;
use fm_storage::{EventSourceTag, InboxRow, InboxStatus, Store};
use yare::parameterized;

fn evaluate(payload: serde_json::Value) -> PolicyDecision {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    let row = InboxRow {
        event_id: "ev-1".to_string(),
        task_id: "t-1".to_string(),
        event_type: "mode.violation".to_string(),
        source: EventSourceTag::Eventbus,
        payload,
        received_at: "ts".to_string(),
        status: InboxStatus::Processing,
        processed_at: None,
    };
    store
        .with_transaction(|tx| {
            let ctx = PolicyCtx {
                tx,
                now_iso: "ts".to_string(),
                now_ms: 0,
            };
            OnModeViolation
                .evaluate(&ctx, &row)
                .map_err(|e| fm_storage::StoreError::NotFound(e.to_string()))
        })
        .unwrap()
}

#[parameterized(
    info = { "info" },
    warning = { "warning" },
)]
fn minor_violations_are_audit_only(severity: &str) {
    let decision = evaluate(serde_json::json!({"severity": severity, "rule": "diff_only"}));
    assert_eq!(decision.verdict, PolicyVerdict::Allow);
    assert_eq!(decision.findings.len(), 1);
}

#[parameterized(
    error = { "error" },
    critical = { "critical" },
)]
fn serious_violations_require_review(severity: &str) {
    let decision = evaluate(serde_json::json!({"severity": severity, "rule": "diff_only"}));
    assert_eq!(decision.verdict, PolicyVerdict::RequireReview);
    assert!(decision.reason.contains("guardian"));
    assert!(decision.reason.contains("diff_only"));
}

#[test]
fn missing_severity_defaults_to_warning() {
    let decision = evaluate(serde_json::json!({"rule": "no_commit"}));
    assert_eq!(decision.verdict, PolicyVerdict::Allow);
}
