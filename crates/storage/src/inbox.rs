// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor inbox: the persistent queue between event ingestion and
//! policy evaluation.
//!
//! Deduplication is the `UNIQUE(event_id)` constraint and nothing else —
//! a constraint violation on insert means "already seen" and is benign.

use crate::store::{is_missing_table, Store, StoreError, StoreTx};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ingestion channel delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSourceTag {
    Eventbus,
    Polling,
}

impl EventSourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSourceTag::Eventbus => "eventbus",
            EventSourceTag::Polling => "polling",
        }
    }
}

impl fmt::Display for EventSourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of an inbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl InboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxStatus::Pending => "pending",
            InboxStatus::Processing => "processing",
            InboxStatus::Completed => "completed",
            InboxStatus::Failed => "failed",
        }
    }
}

/// An event as the supervisor ingests it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorEvent {
    pub event_id: String,
    pub task_id: String,
    pub event_type: String,
    pub source: EventSourceTag,
    pub payload: serde_json::Value,
}

/// A persisted inbox row.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxRow {
    pub event_id: String,
    pub task_id: String,
    pub event_type: String,
    pub source: EventSourceTag,
    pub payload: serde_json::Value,
    pub received_at: String,
    pub status: InboxStatus,
    pub processed_at: Option<String>,
}

/// Queue depth and age, for the backlog SLO.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacklogMetrics {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
    pub completed: u64,
    pub oldest_pending_age_seconds: Option<f64>,
}

fn row_from_sql(row: &Row<'_>) -> Result<InboxRow, rusqlite::Error> {
    let source: String = row.get("source")?;
    let status: String = row.get("status")?;
    let payload: String = row.get("payload")?;
    let to_json_err =
        |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
    Ok(InboxRow {
        event_id: row.get("event_id")?,
        task_id: row.get("task_id")?,
        event_type: row.get("event_type")?,
        source: serde_json::from_value(serde_json::Value::String(source)).map_err(to_json_err)?,
        payload: serde_json::from_str(&payload).map_err(to_json_err)?,
        received_at: row.get("received_at")?,
        status: serde_json::from_value(serde_json::Value::String(status)).map_err(to_json_err)?,
        processed_at: row.get("processed_at")?,
    })
}

/// Insert with dedupe. `Ok(true)` means inserted; `Ok(false)` means the
/// event_id already existed.
pub(crate) fn insert_event(
    conn: &Connection,
    event: &SupervisorEvent,
    received_at: &str,
) -> Result<bool, StoreError> {
    let payload = serde_json::to_string(&event.payload)?;
    let result = conn.execute(
        "INSERT INTO supervisor_inbox
             (event_id, task_id, event_type, source, payload, received_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending')",
        params![
            event.event_id,
            event.task_id,
            event.event_type,
            event.source.as_str(),
            payload,
            received_at,
        ],
    );
    match result {
        Ok(_) => Ok(true),
        Err(e) => {
            let err = StoreError::from(e);
            if err.is_duplicate() {
                tracing::debug!(event_id = %event.event_id, "duplicate event deduped");
                Ok(false)
            } else {
                Err(err)
            }
        }
    }
}

/// Atomically claim the oldest pending row, flipping it to `processing`.
pub(crate) fn claim_next_pending(conn: &Connection) -> Result<Option<InboxRow>, StoreError> {
    let row = match conn
        .query_row(
            "SELECT event_id, task_id, event_type, source, payload, received_at,
                    status, processed_at
             FROM supervisor_inbox
             WHERE status = 'pending'
             ORDER BY received_at, id
             LIMIT 1",
            [],
            row_from_sql,
        )
        .optional()
    {
        Ok(row) => row,
        Err(e) if is_missing_table(&e) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let Some(mut row) = row else {
        return Ok(None);
    };
    conn.execute(
        "UPDATE supervisor_inbox SET status = 'processing' WHERE event_id = ?1",
        params![row.event_id],
    )?;
    row.status = InboxStatus::Processing;
    Ok(Some(row))
}

pub(crate) fn mark_status(
    conn: &Connection,
    event_id: &str,
    status: InboxStatus,
    processed_at: Option<&str>,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE supervisor_inbox SET status = ?2, processed_at = ?3 WHERE event_id = ?1",
        params![event_id, status.as_str(), processed_at],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("inbox row {event_id}")));
    }
    Ok(())
}

pub(crate) fn backlog_metrics(
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<BacklogMetrics, StoreError> {
    let mut metrics = BacklogMetrics {
        pending: 0,
        processing: 0,
        failed: 0,
        completed: 0,
        oldest_pending_age_seconds: None,
    };
    let mut stmt = match conn.prepare(
        "SELECT status, COUNT(*) FROM supervisor_inbox GROUP BY status",
    ) {
        Ok(stmt) => stmt,
        Err(e) if is_missing_table(&e) => return Ok(metrics),
        Err(e) => return Err(e.into()),
    };
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        let count = count.max(0) as u64;
        match status.as_str() {
            "pending" => metrics.pending = count,
            "processing" => metrics.processing = count,
            "failed" => metrics.failed = count,
            "completed" => metrics.completed = count,
            _ => {}
        }
    }

    let oldest: Option<String> = conn
        .query_row(
            "SELECT MIN(received_at) FROM supervisor_inbox WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )
        .optional()?
        .flatten();
    if let Some(ts) = oldest {
        match DateTime::parse_from_rfc3339(&ts) {
            Ok(parsed) => {
                let age = (now - parsed.with_timezone(&Utc)).num_milliseconds() as f64 / 1000.0;
                metrics.oldest_pending_age_seconds = Some(age.max(0.0));
            }
            Err(e) => {
                tracing::warn!(ts = %ts, error = %e, "unparseable received_at on pending row");
            }
        }
    }
    Ok(metrics)
}

/// Delete completed rows processed before the cutoff. Returns how many.
pub(crate) fn purge_completed_before(
    conn: &Connection,
    cutoff_iso: &str,
) -> Result<usize, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM supervisor_inbox
         WHERE status = 'completed' AND processed_at IS NOT NULL AND processed_at < ?1",
        params![cutoff_iso],
    )?;
    Ok(deleted)
}

impl Store {
    pub fn insert_inbox_event(
        &self,
        event: &SupervisorEvent,
        received_at: &str,
    ) -> Result<bool, StoreError> {
        insert_event(&*self.conn()?, event, received_at)
    }

    pub fn claim_next_pending(&self) -> Result<Option<InboxRow>, StoreError> {
        self.with_transaction(|tx| claim_next_pending(tx.conn))
    }

    pub fn inbox_row_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM supervisor_inbox", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn backlog_metrics(&self, now: DateTime<Utc>) -> Result<BacklogMetrics, StoreError> {
        backlog_metrics(&*self.conn()?, now)
    }

    pub fn purge_completed_before(&self, cutoff_iso: &str) -> Result<usize, StoreError> {
        purge_completed_before(&*self.conn()?, cutoff_iso)
    }
}

impl StoreTx<'_> {
    pub fn mark_inbox_status(
        &self,
        event_id: &str,
        status: InboxStatus,
        processed_at: Option<&str>,
    ) -> Result<(), StoreError> {
        mark_status(self.conn, event_id, status, processed_at)
    }
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
