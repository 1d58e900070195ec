// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit and lineage rows, plus the commit index with
//! full-text search over commit messages.

use crate::store::{is_missing_table, Store, StoreError, StoreTx};
use fm_core::{AuditEntry, AuditLevel, LineageEntry, LineageKind, TaskId};
use rusqlite::{params, Connection, Row};

fn audit_from_row(row: &Row<'_>) -> Result<AuditEntry, rusqlite::Error> {
    let level: String = row.get("level")?;
    let payload: String = row.get("payload")?;
    let to_json_err =
        |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
    Ok(AuditEntry {
        task_id: TaskId::new(row.get::<_, String>("task_id")?),
        ts: row.get("ts")?,
        level: serde_json::from_value(serde_json::Value::String(level)).map_err(to_json_err)?,
        event_type: row.get("event_type")?,
        payload: serde_json::from_str(&payload).map_err(to_json_err)?,
    })
}

pub(crate) fn append_audit(conn: &Connection, entry: &AuditEntry) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO task_audits (task_id, ts, level, event_type, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.task_id.as_str(),
            entry.ts,
            entry.level.as_str(),
            entry.event_type,
            serde_json::to_string(&entry.payload)?,
        ],
    )?;
    Ok(())
}

pub(crate) fn list_audit(conn: &Connection, task_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
    let mut stmt = match conn.prepare(
        "SELECT task_id, ts, level, event_type, payload
         FROM task_audits WHERE task_id = ?1 ORDER BY id",
    ) {
        Ok(stmt) => stmt,
        Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let rows = stmt.query_map(params![task_id], audit_from_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

pub(crate) fn append_lineage(conn: &Connection, entry: &LineageEntry) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO task_lineage (task_id, kind, ref_id, phase, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.task_id.as_str(),
            entry.kind.as_str(),
            entry.ref_id,
            entry.phase,
            serde_json::to_string(&entry.metadata)?,
        ],
    )?;
    Ok(())
}

pub(crate) fn list_lineage(
    conn: &Connection,
    task_id: &str,
    kind: Option<LineageKind>,
) -> Result<Vec<LineageEntry>, StoreError> {
    let sql = match kind {
        Some(_) => {
            "SELECT task_id, kind, ref_id, phase, metadata
             FROM task_lineage WHERE task_id = ?1 AND kind = ?2 ORDER BY id"
        }
        None => {
            "SELECT task_id, kind, ref_id, phase, metadata
             FROM task_lineage WHERE task_id = ?1 ORDER BY id"
        }
    };
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let map_row = |row: &Row<'_>| -> Result<LineageEntry, rusqlite::Error> {
        let kind: String = row.get("kind")?;
        let metadata: String = row.get("metadata")?;
        let to_json_err =
            |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
        Ok(LineageEntry {
            task_id: TaskId::new(row.get::<_, String>("task_id")?),
            kind: serde_json::from_value(serde_json::Value::String(kind)).map_err(to_json_err)?,
            ref_id: row.get("ref_id")?,
            phase: row.get("phase")?,
            metadata: serde_json::from_str(&metadata).map_err(to_json_err)?,
        })
    };
    let mut entries = Vec::new();
    match kind {
        Some(k) => {
            let rows = stmt.query_map(params![task_id, k.as_str()], map_row)?;
            for row in rows {
                entries.push(row?);
            }
        }
        None => {
            let rows = stmt.query_map(params![task_id], map_row)?;
            for row in rows {
                entries.push(row?);
            }
        }
    }
    Ok(entries)
}

impl Store {
    /// Append one audit row. The trail is never edited.
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        append_audit(&*self.conn()?, entry)
    }

    /// Convenience for building + appending an audit row.
    pub fn audit(
        &self,
        task_id: &TaskId,
        ts: String,
        level: AuditLevel,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.append_audit(&AuditEntry {
            task_id: task_id.clone(),
            ts,
            level,
            event_type: event_type.to_string(),
            payload,
        })
    }

    pub fn list_audit(&self, task_id: &str) -> Result<Vec<AuditEntry>, StoreError> {
        list_audit(&*self.conn()?, task_id)
    }

    pub fn append_lineage(&self, entry: &LineageEntry) -> Result<(), StoreError> {
        append_lineage(&*self.conn()?, entry)
    }

    pub fn list_lineage(
        &self,
        task_id: &str,
        kind: Option<LineageKind>,
    ) -> Result<Vec<LineageEntry>, StoreError> {
        list_lineage(&*self.conn()?, task_id, kind)
    }
}

impl StoreTx<'_> {
    pub fn append_audit(&self, entry: &AuditEntry) -> Result<(), StoreError> {
        append_audit(self.conn, entry)
    }

    pub fn append_lineage(&self, entry: &LineageEntry) -> Result<(), StoreError> {
        append_lineage(self.conn, entry)
    }
}

#[cfg(test)]
#[path = "trail_tests.rs"]
mod tests;
