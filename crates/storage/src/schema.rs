// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent schema definition. Every statement is `IF NOT EXISTS`, so
//! initialisation can run on every open.

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    task_id        TEXT PRIMARY KEY,
    title          TEXT NOT NULL,
    status         TEXT NOT NULL,
    run_mode       TEXT NOT NULL,
    exit_reason    TEXT,
    metadata       TEXT NOT NULL,
    created_at_ms  INTEGER NOT NULL,
    updated_at_ms  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS task_audits (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id     TEXT NOT NULL,
    ts          TEXT NOT NULL,
    level       TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    payload     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audits_task ON task_audits(task_id, id);

CREATE TABLE IF NOT EXISTS task_lineage (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id   TEXT NOT NULL,
    kind      TEXT NOT NULL,
    ref_id    TEXT NOT NULL,
    phase     TEXT NOT NULL,
    metadata  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_lineage_task ON task_lineage(task_id, id);

CREATE TABLE IF NOT EXISTS supervisor_inbox (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id      TEXT NOT NULL UNIQUE,
    task_id       TEXT NOT NULL,
    event_type    TEXT NOT NULL,
    source        TEXT NOT NULL,
    payload       TEXT NOT NULL,
    received_at   TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    processed_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_inbox_status ON supervisor_inbox(status, received_at, id);

CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id    TEXT PRIMARY KEY,
    task_id          TEXT NOT NULL,
    sequence_number  INTEGER NOT NULL,
    checkpoint_type  TEXT NOT NULL,
    snapshot         TEXT NOT NULL,
    evidence_pack    TEXT NOT NULL,
    work_item_id     TEXT,
    created_at       TEXT NOT NULL,
    verified_at      TEXT,
    UNIQUE(task_id, sequence_number)
);

CREATE TABLE IF NOT EXISTS leases (
    work_item_id     TEXT PRIMARY KEY,
    worker_id        TEXT NOT NULL,
    acquired_at_ms   INTEGER NOT NULL,
    expires_at_ms    INTEGER NOT NULL,
    heartbeat_at_ms  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS llm_cache (
    cache_key       TEXT PRIMARY KEY,
    operation_type  TEXT NOT NULL,
    model           TEXT NOT NULL,
    output          TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tool_ledger (
    task_id      TEXT NOT NULL,
    fingerprint  TEXT NOT NULL,
    result       TEXT NOT NULL,
    exit_code    INTEGER NOT NULL,
    ts           TEXT NOT NULL,
    PRIMARY KEY (task_id, fingerprint)
);

CREATE TABLE IF NOT EXISTS decision_records (
    decision_id      TEXT PRIMARY KEY,
    decision_type    TEXT NOT NULL,
    seed             TEXT NOT NULL,
    inputs           TEXT NOT NULL,
    outputs          TEXT NOT NULL,
    rules_triggered  TEXT NOT NULL,
    final_verdict    TEXT NOT NULL,
    confidence       REAL NOT NULL,
    timestamp        TEXT NOT NULL,
    status           TEXT NOT NULL,
    record_hash      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS decision_signoffs (
    signoff_id   TEXT PRIMARY KEY,
    decision_id  TEXT NOT NULL,
    signed_by    TEXT NOT NULL,
    ts           TEXT NOT NULL,
    note         TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_commits (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id  TEXT NOT NULL,
    sha      TEXT NOT NULL,
    message  TEXT NOT NULL,
    ts       TEXT NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS commit_search USING fts5(
    sha UNINDEXED,
    message
);
";
