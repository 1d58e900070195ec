// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM output cache and tool-call ledger.
//!
//! Both are idempotency mechanisms: the cache keys generated model output
//! by a content hash, the ledger replays identical tool calls within a
//! task scope instead of re-executing them.

use crate::store::{is_missing_table, Store, StoreError};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

/// A replayable record of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolLedgerEntry {
    pub task_id: String,
    pub fingerprint: String,
    pub result: serde_json::Value,
    pub exit_code: i32,
    pub ts: String,
}

impl Store {
    /// Look up a cached LLM output by key.
    pub fn llm_cache_get(&self, cache_key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT output FROM llm_cache WHERE cache_key = ?1",
                params![cache_key],
                |row| row.get(0),
            )
            .optional();
        match result {
            Ok(output) => Ok(output),
            Err(e) if is_missing_table(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a generated output. Last write wins for a given key.
    pub fn llm_cache_put(
        &self,
        cache_key: &str,
        operation_type: &str,
        model: &str,
        output: &str,
        created_at: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO llm_cache (cache_key, operation_type, model, output, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(cache_key) DO UPDATE SET
                 output = excluded.output,
                 created_at = excluded.created_at",
            params![cache_key, operation_type, model, output, created_at],
        )?;
        Ok(())
    }

    /// Previous result for an identical call in the same task scope.
    pub fn tool_ledger_get(
        &self,
        task_id: &str,
        fingerprint: &str,
    ) -> Result<Option<ToolLedgerEntry>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT task_id, fingerprint, result, exit_code, ts
                 FROM tool_ledger WHERE task_id = ?1 AND fingerprint = ?2",
                params![task_id, fingerprint],
                |row| {
                    let result: String = row.get("result")?;
                    Ok((
                        row.get::<_, String>("task_id")?,
                        row.get::<_, String>("fingerprint")?,
                        result,
                        row.get::<_, i32>("exit_code")?,
                        row.get::<_, String>("ts")?,
                    ))
                },
            )
            .optional();
        let raw = match result {
            Ok(raw) => raw,
            Err(e) if is_missing_table(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match raw {
            Some((task_id, fingerprint, result, exit_code, ts)) => Ok(Some(ToolLedgerEntry {
                task_id,
                fingerprint,
                result: serde_json::from_str(&result)?,
                exit_code,
                ts,
            })),
            None => Ok(None),
        }
    }

    /// Record a tool call. The first write for a fingerprint wins; replays
    /// never overwrite the original result.
    pub fn tool_ledger_record(&self, entry: &ToolLedgerEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO tool_ledger (task_id, fingerprint, result, exit_code, ts)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.task_id,
                entry.fingerprint,
                serde_json::to_string(&entry.result)?,
                entry.exit_code,
                entry.ts,
            ],
        )?;
        Ok(())
    }

    /// All ledger entries for a task, in insertion order.
    pub fn tool_ledger_entries(&self, task_id: &str) -> Result<Vec<ToolLedgerEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = match conn.prepare(
            "SELECT task_id, fingerprint, result, exit_code, ts
             FROM tool_ledger WHERE task_id = ?1 ORDER BY rowid",
        ) {
            Ok(stmt) => stmt,
            Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let rows = stmt.query_map(params![task_id], |row| {
            let result: String = row.get("result")?;
            Ok((
                row.get::<_, String>("task_id")?,
                row.get::<_, String>("fingerprint")?,
                result,
                row.get::<_, i32>("exit_code")?,
                row.get::<_, String>("ts")?,
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (task_id, fingerprint, result, exit_code, ts) = row?;
            entries.push(ToolLedgerEntry {
                task_id,
                fingerprint,
                result: serde_json::from_str(&result)?,
                exit_code,
                ts,
            });
        }
        Ok(entries)
    }

    /// Count ledger entries for a task (test and metrics hook).
    pub fn tool_ledger_count(&self, task_id: &str) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT COUNT(*) FROM tool_ledger WHERE task_id = ?1",
            params![task_id],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(count) => Ok(count.max(0) as u64),
            Err(e) if is_missing_table(&e) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
