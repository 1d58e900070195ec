// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work items: sub-tasks executed serially within a task.

use crate::evidence::EvidencePack;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a work item.
    pub struct WorkItemId;
}

/// Execution status of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkItemStatus::Completed | WorkItemStatus::Failed)
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkItemStatus::Pending => "pending",
            WorkItemStatus::Running => "running",
            WorkItemStatus::Completed => "completed",
            WorkItemStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a completed work item produced.
///
/// Once the owning item is completed this block is immutable; a future
/// retry policy must add a new output and point `replaces` at the old one,
/// never mutate it in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkItemOutput {
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub commands_run: Vec<String>,
    #[serde(default)]
    pub tests_run: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<EvidencePack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff_notes: Option<String>,
    /// Output this one supersedes (reserved for retry policies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
}

/// A sub-task within a task. Items execute serially in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    #[serde(default)]
    pub dependencies: Vec<WorkItemId>,
    #[serde(default)]
    pub status: WorkItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkItemOutput>,
    /// Hint for which agent role should pick this item up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_hint: Option<String>,
}

impl WorkItem {
    pub fn new(id: WorkItemId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            dependencies: Vec::new(),
            status: WorkItemStatus::Pending,
            output: None,
            role_hint: None,
        }
    }

    /// Whether every dependency appears, completed, in `items`.
    pub fn dependencies_met(&self, items: &[WorkItem]) -> bool {
        self.dependencies.iter().all(|dep| {
            items
                .iter()
                .any(|i| i.id == *dep && i.status == WorkItemStatus::Completed)
        })
    }
}

#[cfg(test)]
#[path = "work_item_tests.rs"]
mod tests;
