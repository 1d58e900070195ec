// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Store;

fn temp_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    (dir, store)
}

#[test]
fn llm_cache_miss_then_hit() {
    let (_dir, store) = temp_store();
    assert!(store.llm_cache_get("k1").unwrap().is_none());

    store
        .llm_cache_put("k1", "plan", "local-llama", "{\"stages\":[]}", "ts")
        .unwrap();
    assert_eq!(store.llm_cache_get("k1").unwrap().unwrap(), "{\"stages\":[]}");
}

#[test]
fn llm_cache_overwrites_same_key() {
    let (_dir, store) = temp_store();
    store.llm_cache_put("k1", "plan", "m", "v1", "ts1").unwrap();
    store.llm_cache_put("k1", "plan", "m", "v2", "ts2").unwrap();
    assert_eq!(store.llm_cache_get("k1").unwrap().unwrap(), "v2");
}

#[test]
fn tool_ledger_replays_first_result() {
    let (_dir, store) = temp_store();
    let entry = ToolLedgerEntry {
        task_id: "t-1".to_string(),
        fingerprint: "fp-1".to_string(),
        result: serde_json::json!({"diff": "--- a\n+++ b\n"}),
        exit_code: 0,
        ts: "ts1".to_string(),
    };
    store.tool_ledger_record(&entry).unwrap();

    // Second record with the same fingerprint does not overwrite.
    let second = ToolLedgerEntry {
        result: serde_json::json!({"diff": "other"}),
        exit_code: 1,
        ts: "ts2".to_string(),
        ..entry.clone()
    };
    store.tool_ledger_record(&second).unwrap();

    let loaded = store.tool_ledger_get("t-1", "fp-1").unwrap().unwrap();
    assert_eq!(loaded.exit_code, 0);
    assert_eq!(loaded.ts, "ts1");
    assert_eq!(store.tool_ledger_count("t-1").unwrap(), 1);
}

#[test]
fn tool_ledger_is_task_scoped() {
    let (_dir, store) = temp_store();
    let entry = ToolLedgerEntry {
        task_id: "t-1".to_string(),
        fingerprint: "fp-1".to_string(),
        result: serde_json::json!({}),
        exit_code: 0,
        ts: "ts".to_string(),
    };
    store.tool_ledger_record(&entry).unwrap();
    assert!(store.tool_ledger_get("t-2", "fp-1").unwrap().is_none());
}
