// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-item leases: at most one live worker per work item.
//!
//! Acquisition is a compare-and-set inside one statement — a second
//! acquirer fails rather than waiting, per the shared-resource policy.

use crate::store::{is_missing_table, Store, StoreError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A held (or expired) lease row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub work_item_id: String,
    pub worker_id: String,
    pub acquired_at_ms: u64,
    pub expires_at_ms: u64,
    pub heartbeat_at_ms: u64,
}

impl Lease {
    /// A lease is expired once its heartbeat is older than the TTL, i.e.
    /// `expires_at` has passed.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

fn lease_from_row(row: &Row<'_>) -> Result<Lease, rusqlite::Error> {
    Ok(Lease {
        work_item_id: row.get("work_item_id")?,
        worker_id: row.get("worker_id")?,
        acquired_at_ms: row.get::<_, i64>("acquired_at_ms")?.max(0) as u64,
        expires_at_ms: row.get::<_, i64>("expires_at_ms")?.max(0) as u64,
        heartbeat_at_ms: row.get::<_, i64>("heartbeat_at_ms")?.max(0) as u64,
    })
}

/// CAS acquire. Succeeds when no lease exists, the existing lease has
/// expired, or the same worker re-acquires. Returns `None` on contention.
pub(crate) fn acquire_lease(
    conn: &Connection,
    work_item_id: &str,
    worker_id: &str,
    ttl_ms: u64,
    now_ms: u64,
) -> Result<Option<Lease>, StoreError> {
    let expires = (now_ms + ttl_ms) as i64;
    let changed = conn.execute(
        "INSERT INTO leases (work_item_id, worker_id, acquired_at_ms, expires_at_ms, heartbeat_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?3)
         ON CONFLICT(work_item_id) DO UPDATE SET
             worker_id = excluded.worker_id,
             acquired_at_ms = excluded.acquired_at_ms,
             expires_at_ms = excluded.expires_at_ms,
             heartbeat_at_ms = excluded.heartbeat_at_ms
         WHERE leases.expires_at_ms <= ?3 OR leases.worker_id = excluded.worker_id",
        params![work_item_id, worker_id, now_ms as i64, expires],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    Ok(Some(Lease {
        work_item_id: work_item_id.to_string(),
        worker_id: worker_id.to_string(),
        acquired_at_ms: now_ms,
        expires_at_ms: expires.max(0) as u64,
        heartbeat_at_ms: now_ms,
    }))
}

impl Store {
    pub fn acquire_lease(
        &self,
        work_item_id: &str,
        worker_id: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<Option<Lease>, StoreError> {
        self.with_transaction(|tx| acquire_lease(tx.conn, work_item_id, worker_id, ttl_ms, now_ms))
    }

    /// Extend the lease. Fails (returns false) if the holder changed or
    /// the row is gone.
    pub fn heartbeat_lease(
        &self,
        work_item_id: &str,
        worker_id: &str,
        ttl_ms: u64,
        now_ms: u64,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE leases SET heartbeat_at_ms = ?3, expires_at_ms = ?4
             WHERE work_item_id = ?1 AND worker_id = ?2",
            params![
                work_item_id,
                worker_id,
                now_ms as i64,
                (now_ms + ttl_ms) as i64
            ],
        )?;
        Ok(changed == 1)
    }

    /// Release the holder's lease. Returns false if it was not held.
    pub fn release_lease(&self, work_item_id: &str, worker_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM leases WHERE work_item_id = ?1 AND worker_id = ?2",
            params![work_item_id, worker_id],
        )?;
        Ok(changed == 1)
    }

    pub fn get_lease(&self, work_item_id: &str) -> Result<Option<Lease>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT work_item_id, worker_id, acquired_at_ms, expires_at_ms, heartbeat_at_ms
                 FROM leases WHERE work_item_id = ?1",
                params![work_item_id],
                lease_from_row,
            )
            .optional();
        match result {
            Ok(lease) => Ok(lease),
            Err(e) if is_missing_table(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every expired lease, returning how many were reaped.
    pub fn reap_expired_leases(&self, now_ms: u64) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let reaped = conn.execute(
            "DELETE FROM leases WHERE expires_at_ms <= ?1",
            params![now_ms as i64],
        )?;
        Ok(reaped)
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
