// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task artifacts under `artifacts/<task_id>/`.

use crate::error::EngineError;
use fm_core::{WorkItem, WorkItemStatus};
use fm_gates::GateRunResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One stage of a generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStage {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The machine-readable plan, `open_plan.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPlanArtifact {
    pub task_id: String,
    pub generated_at: String,
    pub pipeline_status: String,
    pub pipeline_summary: String,
    #[serde(default)]
    pub stages: Vec<PlanStage>,
}

/// Aggregated per-task summary, `work_items_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemsSummary {
    pub task_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<SummaryItem>,
    pub generated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub item_id: String,
    pub title: String,
    pub status: WorkItemStatus,
}

impl WorkItemsSummary {
    pub fn from_items(task_id: &str, items: &[WorkItem], generated_at: String) -> Self {
        Self {
            task_id: task_id.to_string(),
            total: items.len(),
            completed: items
                .iter()
                .filter(|i| i.status == WorkItemStatus::Completed)
                .count(),
            failed: items
                .iter()
                .filter(|i| i.status == WorkItemStatus::Failed)
                .count(),
            items: items
                .iter()
                .map(|i| SummaryItem {
                    item_id: i.id.to_string(),
                    title: i.title.clone(),
                    status: i.status,
                })
                .collect(),
            generated_at,
        }
    }
}

/// Writes task artifacts to disk.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.root.join(task_id)
    }

    pub fn open_plan_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join("open_plan.json")
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn write_open_plan(
        &self,
        task_id: &str,
        plan: &OpenPlanArtifact,
    ) -> Result<PathBuf, EngineError> {
        let path = self.open_plan_path(task_id);
        self.write_json(&path, plan)?;
        Ok(path)
    }

    pub fn write_work_item(
        &self,
        task_id: &str,
        item: &WorkItem,
    ) -> Result<PathBuf, EngineError> {
        let path = self
            .task_dir(task_id)
            .join(format!("work_item_{}.json", item.id));
        self.write_json(&path, item)?;
        Ok(path)
    }

    pub fn write_summary(
        &self,
        task_id: &str,
        summary: &WorkItemsSummary,
    ) -> Result<PathBuf, EngineError> {
        let path = self.task_dir(task_id).join("work_items_summary.json");
        self.write_json(&path, summary)?;
        Ok(path)
    }

    /// Write `gate_results.json`, plus an attempt-numbered archive copy
    /// so the sequence of verification runs stays on disk.
    pub fn write_gate_results(
        &self,
        task_id: &str,
        result: &GateRunResult,
        attempt: u32,
    ) -> Result<PathBuf, EngineError> {
        let path = self.task_dir(task_id).join("gate_results.json");
        self.write_json(&path, result)?;
        let archived = self
            .task_dir(task_id)
            .join(format!("gate_results_attempt_{attempt}.json"));
        self.write_json(&archived, result)?;
        Ok(path)
    }

    /// Optional out-of-band dispatch script.
    pub fn write_dispatch_command(
        &self,
        task_id: &str,
        script: &str,
    ) -> Result<PathBuf, EngineError> {
        let path = self.task_dir(task_id).join("dispatch_command.sh");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, script)?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
