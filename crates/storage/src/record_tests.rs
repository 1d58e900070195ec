// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;
use fm_core::{DecisionRecord, DecisionSignoff, DecisionType, GovernanceVerdict};

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    (dir, store)
}

fn record(id: &str, seed: &str) -> DecisionRecord {
    DecisionRecord::sealed(
        id.to_string(),
        DecisionType::Policy,
        seed.to_string(),
        serde_json::json!({"event_type": "task.created"}),
        serde_json::json!({"verdict": "ALLOW"}),
        vec![],
        GovernanceVerdict::Allow,
        0.8,
        "2026-01-01T00:00:00+00:00".to_string(),
    )
}

#[test]
fn append_and_load_roundtrip() {
    let (_dir, store) = temp_store();
    let rec = record("dec-1", "t-1");
    store.append_decision(&rec).unwrap();

    let loaded = store.get_decision("dec-1").unwrap().unwrap();
    assert_eq!(loaded.record_hash, rec.record_hash);
    assert!(loaded.verify_integrity().is_ok());
}

#[test]
fn append_rejects_duplicate_ids() {
    let (_dir, store) = temp_store();
    store.append_decision(&record("dec-1", "t-1")).unwrap();
    let err = store.append_decision(&record("dec-1", "t-1")).unwrap_err();
    assert!(err.is_duplicate());
}

#[test]
fn list_filters_by_seed_newest_first() {
    let (_dir, store) = temp_store();
    let mut early = record("dec-1", "t-1");
    early.timestamp = "2026-01-01T00:00:00+00:00".to_string();
    let mut late = record("dec-2", "t-1");
    late.timestamp = "2026-01-02T00:00:00+00:00".to_string();
    store.append_decision(&early).unwrap();
    store.append_decision(&late).unwrap();
    store.append_decision(&record("dec-3", "t-2")).unwrap();

    let records = store.list_decisions(Some("t-1"), 10).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].decision_id, "dec-2");
}

#[test]
fn signoff_flips_status_to_signed() {
    let (_dir, store) = temp_store();
    store.append_decision(&record("dec-1", "t-1")).unwrap();

    store
        .sign_decision(&DecisionSignoff {
            signoff_id: "s-1".to_string(),
            decision_id: "dec-1".to_string(),
            signed_by: "operator".to_string(),
            ts: "2026-01-03T00:00:00+00:00".to_string(),
            note: "reviewed".to_string(),
        })
        .unwrap();

    let loaded = store.get_decision("dec-1").unwrap().unwrap();
    assert_eq!(loaded.status, fm_core::DecisionRecordStatus::Signed);
    assert_eq!(loaded.signoff.clone().unwrap().signed_by, "operator");
    // Hash still verifies: sign-off is outside the sealed field set.
    assert!(loaded.verify_integrity().is_ok());
}

#[test]
fn tampering_is_detected_by_integrity_sweep() {
    let (_dir, store) = temp_store();
    store.append_decision(&record("dec-1", "t-1")).unwrap();
    assert!(store.verify_decision_integrity().unwrap().is_empty());

    // Tamper with the stored seed behind the ledger's back.
    let conn = store.conn().unwrap();
    conn.execute(
        "UPDATE decision_records SET seed = 'forged' WHERE decision_id = 'dec-1'",
        [],
    )
    .unwrap();
    drop(conn);

    let failed = store.verify_decision_integrity().unwrap();
    assert_eq!(failed, vec!["dec-1".to_string()]);
}
