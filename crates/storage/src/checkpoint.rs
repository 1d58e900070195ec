// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint rows with a dense, monotonically increasing sequence number
//! per task. The sequence is assigned inside the insert transaction so
//! concurrent writers cannot produce gaps or duplicates.

use crate::store::{is_missing_table, Store, StoreError};
use fm_core::EvidencePack;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRow {
    pub checkpoint_id: String,
    pub task_id: String,
    pub sequence_number: u64,
    pub checkpoint_type: String,
    pub snapshot: serde_json::Value,
    pub evidence_pack: EvidencePack,
    pub work_item_id: Option<String>,
    pub created_at: String,
    pub verified_at: Option<String>,
}

fn row_from_sql(row: &Row<'_>) -> Result<CheckpointRow, rusqlite::Error> {
    let snapshot: String = row.get("snapshot")?;
    let evidence: String = row.get("evidence_pack")?;
    let to_json_err =
        |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
    Ok(CheckpointRow {
        checkpoint_id: row.get("checkpoint_id")?,
        task_id: row.get("task_id")?,
        sequence_number: row.get::<_, i64>("sequence_number")?.max(0) as u64,
        checkpoint_type: row.get("checkpoint_type")?,
        snapshot: serde_json::from_str(&snapshot).map_err(to_json_err)?,
        evidence_pack: serde_json::from_str(&evidence).map_err(to_json_err)?,
        work_item_id: row.get("work_item_id")?,
        created_at: row.get("created_at")?,
        verified_at: row.get("verified_at")?,
    })
}

const SELECT: &str = "SELECT checkpoint_id, task_id, sequence_number, checkpoint_type,
                             snapshot, evidence_pack, work_item_id, created_at, verified_at
                      FROM checkpoints";

pub(crate) fn append_checkpoint(
    conn: &Connection,
    checkpoint_id: &str,
    task_id: &str,
    checkpoint_type: &str,
    snapshot: &serde_json::Value,
    evidence_pack: &EvidencePack,
    work_item_id: Option<&str>,
    created_at: &str,
) -> Result<u64, StoreError> {
    let next_seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence_number), 0) + 1 FROM checkpoints WHERE task_id = ?1",
        params![task_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO checkpoints
             (checkpoint_id, task_id, sequence_number, checkpoint_type, snapshot,
              evidence_pack, work_item_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            checkpoint_id,
            task_id,
            next_seq,
            checkpoint_type,
            serde_json::to_string(snapshot)?,
            serde_json::to_string(evidence_pack)?,
            work_item_id,
            created_at,
        ],
    )?;
    Ok(next_seq.max(0) as u64)
}

impl Store {
    /// Append a checkpoint, assigning the next sequence number for the
    /// task. Returns the assigned sequence number.
    #[allow(clippy::too_many_arguments)]
    pub fn append_checkpoint(
        &self,
        checkpoint_id: &str,
        task_id: &str,
        checkpoint_type: &str,
        snapshot: &serde_json::Value,
        evidence_pack: &EvidencePack,
        work_item_id: Option<&str>,
        created_at: &str,
    ) -> Result<u64, StoreError> {
        self.with_transaction(|tx| {
            append_checkpoint(
                tx.conn,
                checkpoint_id,
                task_id,
                checkpoint_type,
                snapshot,
                evidence_pack,
                work_item_id,
                created_at,
            )
        })
    }

    pub fn get_checkpoint(&self, checkpoint_id: &str) -> Result<Option<CheckpointRow>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("{SELECT} WHERE checkpoint_id = ?1"),
                params![checkpoint_id],
                row_from_sql,
            )
            .optional();
        match result {
            Ok(row) => Ok(row),
            Err(e) if is_missing_table(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest checkpoint for a task, by sequence number.
    pub fn latest_checkpoint(&self, task_id: &str) -> Result<Option<CheckpointRow>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("{SELECT} WHERE task_id = ?1 ORDER BY sequence_number DESC LIMIT 1"),
                params![task_id],
                row_from_sql,
            )
            .optional();
        match result {
            Ok(row) => Ok(row),
            Err(e) if is_missing_table(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_checkpoints(&self, task_id: &str) -> Result<Vec<CheckpointRow>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            match conn.prepare(&format!("{SELECT} WHERE task_id = ?1 ORDER BY sequence_number")) {
                Ok(stmt) => stmt,
                Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
        let rows = stmt.query_map(params![task_id], row_from_sql)?;
        let mut checkpoints = Vec::new();
        for row in rows {
            checkpoints.push(row?);
        }
        Ok(checkpoints)
    }

    /// Stamp the row as verified at `ts`.
    pub fn mark_checkpoint_verified(
        &self,
        checkpoint_id: &str,
        ts: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE checkpoints SET verified_at = ?2 WHERE checkpoint_id = ?1",
            params![checkpoint_id, ts],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("checkpoint {checkpoint_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
