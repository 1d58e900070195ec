// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{FakeClock, SequentialIdGen};
use serial_test::serial;

fn recorder() -> (
    tempfile::TempDir,
    Store,
    DecisionRecorder<FakeClock, SequentialIdGen>,
) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    let recorder = DecisionRecorder::new(store.clone(), FakeClock::new(), SequentialIdGen::new("dec"));
    (dir, store, recorder)
}

use fm_storage::Store;

#[test]
fn record_seals_and_appends() {
    let (_dir, store, recorder) = recorder();
    let record = recorder
        .record(
            DecisionType::Policy,
            "t-1",
            serde_json::json!({"event_type": "task.created"}),
            serde_json::json!({"verdict": "ALLOW"}),
            0.9,
        )
        .unwrap();
    assert_eq!(record.final_verdict, GovernanceVerdict::Allow);

    let loaded = store.get_decision(&record.decision_id).unwrap().unwrap();
    assert!(loaded.verify_integrity().is_ok());
    assert!(recorder.verify_integrity(&record.decision_id).is_ok());
}

#[test]
fn governance_rules_pick_most_restrictive() {
    let (rules, verdict) = apply_governance_rules(
        DecisionType::Policy,
        &serde_json::json!({}),
        &serde_json::json!({"verdict": "BLOCK", "max_risk_level": "HIGH"}),
    );
    assert_eq!(rules.len(), 2);
    assert_eq!(verdict, GovernanceVerdict::Block);

    let (rules, verdict) = apply_governance_rules(
        DecisionType::Policy,
        &serde_json::json!({}),
        &serde_json::json!({"verdict": "REQUIRE_REVIEW"}),
    );
    assert_eq!(rules.len(), 1);
    assert_eq!(verdict, GovernanceVerdict::RequireSignoff);

    let (rules, verdict) = apply_governance_rules(
        DecisionType::Policy,
        &serde_json::json!({}),
        &serde_json::json!({"verdict": "ALLOW"}),
    );
    assert!(rules.is_empty());
    assert_eq!(verdict, GovernanceVerdict::Allow);
}

#[test]
fn low_confidence_navigation_warns() {
    let (rules, verdict) = apply_governance_rules(
        DecisionType::Navigation,
        &serde_json::json!({"seed": "entity"}),
        &serde_json::json!({"avg_confidence": 0.1}),
    );
    assert_eq!(rules[0].rule_id, "GR-004");
    assert_eq!(verdict, GovernanceVerdict::Warn);
}

#[test]
fn unhealthy_health_report_warns() {
    let (rules, verdict) = apply_governance_rules(
        DecisionType::Health,
        &serde_json::json!({"window_days": 7}),
        &serde_json::json!({"current_health_score": 25.0}),
    );
    assert_eq!(rules[0].rule_id, "GR-005");
    assert_eq!(verdict, GovernanceVerdict::Warn);
}

#[test]
fn tampering_is_detected_through_the_recorder() {
    let (_dir, store, recorder) = recorder();
    // Seal a record, then mutate a sealed field before it reaches the
    // ledger: the stored hash no longer matches the stored fields.
    let mut record = recorder.seal(
        DecisionType::Compare,
        "snap-1",
        serde_json::json!({"from": "snap-1", "to": "snap-2"}),
        serde_json::json!({"overall_assessment": "regressed"}),
        0.8,
    );
    record.outputs = serde_json::json!({"overall_assessment": "improved"});
    store.append_decision(&record).unwrap();

    assert!(recorder.verify_integrity(&record.decision_id).is_err());
    assert_eq!(
        store.verify_decision_integrity().unwrap(),
        vec![record.decision_id]
    );
}

#[test]
#[serial]
fn signoff_requires_the_admin_token() {
    let (_dir, store, recorder) = recorder();
    let record = recorder
        .record(
            DecisionType::Policy,
            "t-1",
            serde_json::json!({}),
            serde_json::json!({"verdict": "REQUIRE_REVIEW"}),
            0.9,
        )
        .unwrap();

    std::env::remove_var(ADMIN_TOKEN_ENV);
    assert!(matches!(
        recorder.sign(&record.decision_id, "op", "ok", "whatever"),
        Err(SignoffError::TokenRejected)
    ));

    std::env::set_var(ADMIN_TOKEN_ENV, "sekrit");
    assert!(matches!(
        recorder.sign(&record.decision_id, "op", "ok", "wrong"),
        Err(SignoffError::TokenRejected)
    ));

    let signoff = recorder
        .sign(&record.decision_id, "operator", "reviewed and fine", "sekrit")
        .unwrap();
    assert_eq!(signoff.signed_by, "operator");

    let loaded = store.get_decision(&record.decision_id).unwrap().unwrap();
    assert_eq!(loaded.status, fm_core::DecisionRecordStatus::Signed);
    // The sealed fields still verify after signing.
    assert!(loaded.verify_integrity().is_ok());
    std::env::remove_var(ADMIN_TOKEN_ENV);
}

#[test]
#[serial]
fn signing_unknown_decision_fails() {
    let (_dir, _store, recorder) = recorder();
    std::env::set_var(ADMIN_TOKEN_ENV, "sekrit");
    assert!(matches!(
        recorder.sign("missing", "op", "n", "sekrit"),
        Err(SignoffError::NotFound(_))
    ));
    std::env::remove_var(ADMIN_TOKEN_ENV);
}
