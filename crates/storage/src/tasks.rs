// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task rows: upsert by natural key, status transitions, exit reasons.

use crate::store::{is_missing_table, Store, StoreError, StoreTx};
use fm_core::{ExitReason, RunMode, Task, TaskId, TaskMetadata, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn task_from_row(row: &Row<'_>) -> Result<Task, rusqlite::Error> {
    let status: String = row.get("status")?;
    let run_mode: String = row.get("run_mode")?;
    let exit_reason: Option<String> = row.get("exit_reason")?;
    let metadata: String = row.get("metadata")?;
    let to_json_err =
        |e: serde_json::Error| rusqlite::Error::ToSqlConversionFailure(Box::new(e));
    Ok(Task {
        id: TaskId::new(row.get::<_, String>("task_id")?),
        title: row.get("title")?,
        status: serde_json::from_value(serde_json::Value::String(status))
            .map_err(to_json_err)?,
        run_mode: serde_json::from_value(serde_json::Value::String(run_mode))
            .map_err(to_json_err)?,
        metadata: serde_json::from_str(&metadata).map_err(to_json_err)?,
        exit_reason: match exit_reason {
            Some(r) => Some(
                serde_json::from_value(serde_json::Value::String(r)).map_err(to_json_err)?,
            ),
            None => None,
        },
        created_at_ms: row.get::<_, i64>("created_at_ms")? as u64,
        updated_at_ms: row.get::<_, i64>("updated_at_ms")? as u64,
    })
}

pub(crate) fn upsert_task(conn: &Connection, task: &Task) -> Result<(), StoreError> {
    let metadata = serde_json::to_string(&task.metadata)?;
    conn.execute(
        "INSERT INTO tasks (task_id, title, status, run_mode, exit_reason, metadata,
                            created_at_ms, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(task_id) DO UPDATE SET
             title = excluded.title,
             status = excluded.status,
             run_mode = excluded.run_mode,
             exit_reason = excluded.exit_reason,
             metadata = excluded.metadata,
             updated_at_ms = excluded.updated_at_ms",
        params![
            task.id.as_str(),
            task.title,
            task.status.as_str(),
            task.run_mode.as_str(),
            task.exit_reason.map(|r| r.as_str()),
            metadata,
            task.created_at_ms as i64,
            task.updated_at_ms as i64,
        ],
    )?;
    Ok(())
}

pub(crate) fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>, StoreError> {
    let result = conn
        .query_row(
            "SELECT task_id, title, status, run_mode, exit_reason, metadata,
                    created_at_ms, updated_at_ms
             FROM tasks WHERE task_id = ?1",
            params![id],
            task_from_row,
        )
        .optional();
    match result {
        Ok(task) => Ok(task),
        Err(e) if is_missing_table(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn list_tasks(conn: &Connection) -> Result<Vec<Task>, StoreError> {
    let mut stmt = match conn.prepare(
        "SELECT task_id, title, status, run_mode, exit_reason, metadata,
                created_at_ms, updated_at_ms
         FROM tasks ORDER BY created_at_ms, task_id",
    ) {
        Ok(stmt) => stmt,
        Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let rows = stmt.query_map([], task_from_row)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}

/// Move a task along the state machine. Rejects illegal edges and any
/// mutation of a terminal row.
pub(crate) fn update_task_status(
    conn: &Connection,
    id: &str,
    to: TaskStatus,
    now_ms: u64,
) -> Result<Task, StoreError> {
    let mut task =
        get_task(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("task {id}")))?;
    if !task.status.can_transition_to(to) {
        return Err(StoreError::IllegalTransition {
            task_id: id.to_string(),
            from: task.status.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }
    task.status = to;
    task.updated_at_ms = now_ms;
    upsert_task(conn, &task)?;
    Ok(task)
}

/// Backfill the exit reason. Legal even on terminal rows; this is the one
/// permitted late mutation.
pub(crate) fn update_exit_reason(
    conn: &Connection,
    id: &str,
    reason: ExitReason,
    now_ms: u64,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        "UPDATE tasks SET exit_reason = ?2, updated_at_ms = ?3 WHERE task_id = ?1",
        params![id, reason.as_str(), now_ms as i64],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("task {id}")));
    }
    Ok(())
}

pub(crate) fn set_task_metadata(
    conn: &Connection,
    id: &str,
    metadata: &TaskMetadata,
    now_ms: u64,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(metadata)?;
    let changed = conn.execute(
        "UPDATE tasks SET metadata = ?2, updated_at_ms = ?3 WHERE task_id = ?1",
        params![id, json, now_ms as i64],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("task {id}")));
    }
    Ok(())
}

impl Store {
    /// Insert or update a task by its natural key.
    pub fn upsert_task(&self, task: &Task) -> Result<(), StoreError> {
        upsert_task(&*self.conn()?, task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        get_task(&*self.conn()?, id)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        list_tasks(&*self.conn()?)
    }

    /// Create a task in `created` status.
    pub fn create_task(
        &self,
        id: &TaskId,
        title: &str,
        run_mode: RunMode,
        now_ms: u64,
    ) -> Result<Task, StoreError> {
        let task = Task::new(id.clone(), title, run_mode, now_ms);
        self.upsert_task(&task)?;
        Ok(task)
    }

    pub fn update_task_status(
        &self,
        id: &str,
        to: TaskStatus,
        now_ms: u64,
    ) -> Result<Task, StoreError> {
        update_task_status(&*self.conn()?, id, to, now_ms)
    }

    pub fn update_exit_reason(
        &self,
        id: &str,
        reason: ExitReason,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        update_exit_reason(&*self.conn()?, id, reason, now_ms)
    }

    pub fn set_task_metadata(
        &self,
        id: &str,
        metadata: &TaskMetadata,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        set_task_metadata(&*self.conn()?, id, metadata, now_ms)
    }
}

impl StoreTx<'_> {
    pub fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        get_task(self.conn, id)
    }

    pub fn update_task_status(
        &self,
        id: &str,
        to: TaskStatus,
        now_ms: u64,
    ) -> Result<Task, StoreError> {
        update_task_status(self.conn, id, to, now_ms)
    }

    pub fn set_task_metadata(
        &self,
        id: &str,
        metadata: &TaskMetadata,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        set_task_metadata(self.conn, id, metadata, now_ms)
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
