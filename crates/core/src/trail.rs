// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit and lineage entries: the append-only trail behind every task.

use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

impl AuditLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditLevel::Info => "info",
            AuditLevel::Warn => "warn",
            AuditLevel::Error => "error",
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit row. Never edited after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub task_id: TaskId,
    /// ISO-8601 UTC timestamp.
    pub ts: String,
    pub level: AuditLevel,
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// What kind of causal link a lineage entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageKind {
    Pipeline,
    RunnerSpawn,
    RunnerExit,
    PauseCheckpoint,
    ExecutionRequest,
    Artifact,
    Commit,
    GateResult,
}

impl LineageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineageKind::Pipeline => "pipeline",
            LineageKind::RunnerSpawn => "runner_spawn",
            LineageKind::RunnerExit => "runner_exit",
            LineageKind::PauseCheckpoint => "pause_checkpoint",
            LineageKind::ExecutionRequest => "execution_request",
            LineageKind::Artifact => "artifact",
            LineageKind::Commit => "commit",
            LineageKind::GateResult => "gate_result",
        }
    }
}

impl fmt::Display for LineageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A causal link: "this task produced / was driven by that thing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub task_id: TaskId,
    pub kind: LineageKind,
    /// Identifier of the linked object (runner pid, artifact path, commit
    /// sha, pipeline run id, ...).
    pub ref_id: String,
    /// Which phase of the task produced the link.
    pub phase: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl LineageEntry {
    pub fn new(
        task_id: TaskId,
        kind: LineageKind,
        ref_id: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            kind,
            ref_id: ref_id.into(),
            phase: phase.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
#[path = "trail_tests.rs"]
mod tests;
