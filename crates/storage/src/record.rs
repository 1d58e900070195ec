// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the governance decision ledger.
//!
//! Records are append-only. The single permitted mutation is attaching a
//! sign-off, which inserts a `decision_signoffs` row and flips the record
//! status to SIGNED.

use crate::store::{is_missing_table, Store, StoreError, StoreTx};
use fm_core::{DecisionRecord, DecisionRecordStatus, DecisionSignoff};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn record_from_row(row: &Row<'_>) -> Result<DecisionRecord, rusqlite::Error> {
    let to_json_err =
        |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
    let decision_type: String = row.get("decision_type")?;
    let inputs: String = row.get("inputs")?;
    let outputs: String = row.get("outputs")?;
    let rules: String = row.get("rules_triggered")?;
    let verdict: String = row.get("final_verdict")?;
    let status: String = row.get("status")?;
    Ok(DecisionRecord {
        decision_id: row.get("decision_id")?,
        decision_type: serde_json::from_value(serde_json::Value::String(decision_type))
            .map_err(to_json_err)?,
        seed: row.get("seed")?,
        inputs: serde_json::from_str(&inputs).map_err(to_json_err)?,
        outputs: serde_json::from_str(&outputs).map_err(to_json_err)?,
        rules_triggered: serde_json::from_str(&rules).map_err(to_json_err)?,
        final_verdict: serde_json::from_value(serde_json::Value::String(verdict))
            .map_err(to_json_err)?,
        confidence: row.get("confidence")?,
        timestamp: row.get("timestamp")?,
        signoff: None,
        status: serde_json::from_value(serde_json::Value::String(status)).map_err(to_json_err)?,
        record_hash: row.get("record_hash")?,
    })
}

const SELECT: &str = "SELECT decision_id, decision_type, seed, inputs, outputs,
                             rules_triggered, final_verdict, confidence, timestamp,
                             status, record_hash
                      FROM decision_records";

pub(crate) fn append_decision(
    conn: &Connection,
    record: &DecisionRecord,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO decision_records
             (decision_id, decision_type, seed, inputs, outputs, rules_triggered,
              final_verdict, confidence, timestamp, status, record_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.decision_id,
            record.decision_type.as_str(),
            record.seed,
            serde_json::to_string(&record.inputs)?,
            serde_json::to_string(&record.outputs)?,
            serde_json::to_string(&record.rules_triggered)?,
            record.final_verdict.as_str(),
            record.confidence,
            record.timestamp,
            record.status.as_str(),
            record.record_hash,
        ],
    )?;
    Ok(())
}

fn attach_signoff(conn: &Connection, record: &mut DecisionRecord) -> Result<(), StoreError> {
    let signoff = conn
        .query_row(
            "SELECT signoff_id, decision_id, signed_by, ts, note
             FROM decision_signoffs WHERE decision_id = ?1",
            params![record.decision_id],
            |row| {
                Ok(DecisionSignoff {
                    signoff_id: row.get(0)?,
                    decision_id: row.get(1)?,
                    signed_by: row.get(2)?,
                    ts: row.get(3)?,
                    note: row.get(4)?,
                })
            },
        )
        .optional()?;
    record.signoff = signoff;
    Ok(())
}

impl Store {
    /// Append an immutable decision record.
    pub fn append_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        append_decision(&*self.conn()?, record)
    }

    pub fn get_decision(&self, decision_id: &str) -> Result<Option<DecisionRecord>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("{SELECT} WHERE decision_id = ?1"),
                params![decision_id],
                record_from_row,
            )
            .optional();
        let mut record = match result {
            Ok(record) => record,
            Err(e) if is_missing_table(&e) => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(record) = record.as_mut() {
            attach_signoff(&conn, record)?;
        }
        Ok(record)
    }

    /// List records, optionally filtered by seed, newest first.
    pub fn list_decisions(
        &self,
        seed: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = match seed {
            Some(_) => format!("{SELECT} WHERE seed = ?1 ORDER BY timestamp DESC LIMIT ?2"),
            None => format!("{SELECT} ORDER BY timestamp DESC LIMIT ?1"),
        };
        let mut stmt = match conn.prepare(&sql) {
            Ok(stmt) => stmt,
            Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        match seed {
            Some(seed) => {
                let rows = stmt.query_map(params![seed, limit as i64], record_from_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
            None => {
                let rows = stmt.query_map(params![limit as i64], record_from_row)?;
                for row in rows {
                    records.push(row?);
                }
            }
        }
        Ok(records)
    }

    /// Attach a sign-off and flip status to SIGNED, atomically.
    pub fn sign_decision(&self, signoff: &DecisionSignoff) -> Result<(), StoreError> {
        self.with_transaction(|tx| {
            tx.conn.execute(
                "INSERT INTO decision_signoffs (signoff_id, decision_id, signed_by, ts, note)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    signoff.signoff_id,
                    signoff.decision_id,
                    signoff.signed_by,
                    signoff.ts,
                    signoff.note,
                ],
            )?;
            let changed = tx.conn.execute(
                "UPDATE decision_records SET status = ?2 WHERE decision_id = ?1",
                params![signoff.decision_id, DecisionRecordStatus::Signed.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!(
                    "decision {}",
                    signoff.decision_id
                )));
            }
            Ok(())
        })
    }

    /// Recompute every stored record's hash. Returns the ids that fail.
    pub fn verify_decision_integrity(&self) -> Result<Vec<String>, StoreError> {
        let records = self.list_decisions(None, usize::MAX >> 1)?;
        Ok(records
            .into_iter()
            .filter(|r| r.verify_integrity().is_err())
            .map(|r| r.decision_id)
            .collect())
    }
}

impl StoreTx<'_> {
    pub fn append_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        append_decision(self.conn, record)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
