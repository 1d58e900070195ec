// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commit index with FTS5 search over messages.

use crate::store::{is_missing_table, Store, StoreError};
use rusqlite::params;

impl Store {
    /// Record a commit produced by a task, indexing its message.
    pub fn record_commit(
        &self,
        task_id: &str,
        sha: &str,
        message: &str,
        ts: &str,
    ) -> Result<(), StoreError> {
        self.with_transaction(|tx| {
            tx.conn.execute(
                "INSERT INTO task_commits (task_id, sha, message, ts) VALUES (?1, ?2, ?3, ?4)",
                params![task_id, sha, message, ts],
            )?;
            tx.conn.execute(
                "INSERT INTO commit_search (sha, message) VALUES (?1, ?2)",
                params![sha, message],
            )?;
            Ok(())
        })
    }

    /// Full-text search over commit messages. Returns (sha, message).
    pub fn search_commits(&self, query: &str) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = match conn.prepare(
            "SELECT sha, message FROM commit_search WHERE commit_search MATCH ?1 ORDER BY rank",
        ) {
            Ok(stmt) => stmt,
            Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let rows = stmt.query_map(params![query], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
