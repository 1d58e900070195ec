// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The executing phase: serial work items with leases and per-item
//! checkpoints, or the coordinator pipeline when no items were declared.

use crate::artifacts::WorkItemsSummary;
use crate::error::EngineError;
use crate::runner::{payload, RunCtx, TaskRunner};
use fm_core::{
    AuditLevel, Clock, Evidence, EvidencePack, EventKind, ExitReason, IdGen, LineageKind, Task,
    TaskStatus, WorkItemOutput, WorkItemStatus,
};
use fm_storage::ToolLedgerEntry;
use serde_json::Value;
use sha2::{Digest, Sha256};

impl<C: Clock, G: IdGen> TaskRunner<C, G> {
    pub(crate) async fn drive_executing(
        &self,
        _ctx: &mut RunCtx,
        task: &Task,
    ) -> Result<Option<ExitReason>, EngineError> {
        let settings = self.effective_settings(task);
        tracing::debug!(
            task = %task.id,
            runner = %settings.runner,
            dir = %settings.working_directory.display(),
            "executing with effective settings"
        );

        if task.metadata.work_items.is_empty() {
            self.run_coordinator(task).await?;
        } else if let Some(exit) = self.run_work_items(task).await? {
            return Ok(Some(exit));
        }

        self.set_status(&task.id, TaskStatus::Verifying)?;
        Ok(None)
    }

    /// Execute declared work items serially, fail-fast on the first
    /// failure. Completed items (from recovery) are skipped; their
    /// outputs are immutable.
    async fn run_work_items(&self, task: &Task) -> Result<Option<ExitReason>, EngineError> {
        let mut items = task.metadata.work_items.clone();

        for index in 0..items.len() {
            if items[index].status == WorkItemStatus::Completed {
                continue;
            }
            if !items[index].dependencies_met(&items) {
                let message = format!(
                    "work item {} has unmet dependencies",
                    items[index].id
                );
                return self.fail_items(task, &mut items, index, &message).await;
            }

            let item_id = items[index].id.to_string();
            let Some(lease) = self.leases.acquire(&item_id)? else {
                let message = format!("lease for work item {item_id} is held elsewhere");
                return self.fail_items(task, &mut items, index, &message).await;
            };

            items[index].status = WorkItemStatus::Running;
            self.persist_items(task, &items)?;
            self.emit(
                EventKind::StepStarted,
                task.id.as_str(),
                payload(&[("item_id", Value::String(item_id.clone()))]),
            );

            let budget = self.remaining_budget(task);
            let outcome = tokio::time::timeout(
                budget,
                self.pipelines.execute_item(task, &items[index]),
            )
            .await;

            match outcome {
                Ok(Ok(output)) => {
                    self.complete_item(task, &mut items, index, output)?;
                    lease.release(true)?;
                }
                Ok(Err(e)) => {
                    lease.release(false)?;
                    let message = e.to_string();
                    return self.fail_items(task, &mut items, index, &message).await;
                }
                Err(_) => {
                    lease.release(false)?;
                    self.audit(
                        task.id.as_str(),
                        AuditLevel::Error,
                        "timeout_exceeded",
                        serde_json::json!({"phase": "executing", "item_id": item_id}),
                    );
                    items[index].status = WorkItemStatus::Failed;
                    self.persist_items(task, &items)?;
                    self.fail_if_running(task.id.as_str());
                    return Ok(Some(ExitReason::Timeout));
                }
            }
        }

        let summary =
            WorkItemsSummary::from_items(task.id.as_str(), &items, self.clock.now_iso());
        let path = self.artifacts.write_summary(task.id.as_str(), &summary)?;
        self.lineage(
            task.id.as_str(),
            LineageKind::Artifact,
            &path.to_string_lossy(),
            "executing",
        );
        Ok(None)
    }

    fn complete_item(
        &self,
        task: &Task,
        items: &mut [fm_core::WorkItem],
        index: usize,
        output: WorkItemOutput,
    ) -> Result<(), EngineError> {
        let item_id = items[index].id.to_string();

        // Commands that ran become ledger entries, which is what the
        // command-exit evidence verifies against later.
        for command in &output.commands_run {
            let mut hasher = Sha256::new();
            hasher.update(item_id.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(command.as_bytes());
            self.store.tool_ledger_record(&ToolLedgerEntry {
                task_id: task.id.to_string(),
                fingerprint: format!("{:x}", hasher.finalize()),
                result: serde_json::json!({"command": command, "item_id": item_id}),
                exit_code: 0,
                ts: self.clock.now_iso(),
            })?;
        }

        items[index].status = WorkItemStatus::Completed;
        items[index].output = Some(output.clone());
        let artifact_path = self.artifacts.write_work_item(task.id.as_str(), &items[index])?;
        self.persist_items(task, items)?;
        self.lineage(
            task.id.as_str(),
            LineageKind::Artifact,
            &artifact_path.to_string_lossy(),
            "executing",
        );

        let mut evidence = vec![Evidence::ArtifactExists {
            path: artifact_path.to_string_lossy().into_owned(),
            artifact_type: "json".to_string(),
        }];
        for command in &output.commands_run {
            evidence.push(Evidence::CommandExit {
                command: command.clone(),
                exit_code: 0,
            });
        }
        let step = self.steps.begin_step(
            task.id.as_str(),
            "work_item_complete",
            serde_json::json!({"item_id": item_id}),
            Some(&item_id),
        );
        self.steps
            .commit_step(&step, EvidencePack::require_all(evidence))?;

        self.emit(
            EventKind::StepCompleted,
            task.id.as_str(),
            payload(&[("item_id", Value::String(item_id.clone()))]),
        );
        self.audit(
            task.id.as_str(),
            AuditLevel::Info,
            "work_item_completed",
            serde_json::json!({"item_id": item_id, "files_changed": output.files_changed.len()}),
        );
        Ok(())
    }

    async fn fail_items(
        &self,
        task: &Task,
        items: &mut [fm_core::WorkItem],
        index: usize,
        message: &str,
    ) -> Result<Option<ExitReason>, EngineError> {
        let item_id = items[index].id.to_string();
        items[index].status = WorkItemStatus::Failed;
        self.persist_items(task, items)?;
        self.audit(
            task.id.as_str(),
            AuditLevel::Error,
            "work_item_failed",
            serde_json::json!({"item_id": item_id, "error": message}),
        );
        self.emit(
            EventKind::StepFailed,
            task.id.as_str(),
            payload(&[
                ("item_id", Value::String(item_id)),
                ("error", Value::String(message.to_string())),
            ]),
        );
        // Fail-fast: retry/skip is a policy for a later version, and any
        // future retry must add a new output, never rewrite this one.
        let summary =
            WorkItemsSummary::from_items(task.id.as_str(), items, self.clock.now_iso());
        let _ = self.artifacts.write_summary(task.id.as_str(), &summary);
        self.fail_if_running(task.id.as_str());
        self.emit(
            EventKind::TaskFailed,
            task.id.as_str(),
            payload(&[("error", Value::String(message.to_string()))]),
        );
        Ok(Some(ExitReason::FatalError))
    }

    fn persist_items(&self, task: &Task, items: &[fm_core::WorkItem]) -> Result<(), EngineError> {
        let Some(current) = self.store.get_task(task.id.as_str())? else {
            return Ok(());
        };
        let mut metadata = current.metadata;
        metadata.work_items = items.to_vec();
        self.store
            .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        Ok(())
    }

    /// No declared items: one coordinator pipeline run produces commits,
    /// artifacts, and execution requests, all lineage-linked.
    async fn run_coordinator(&self, task: &Task) -> Result<(), EngineError> {
        let budget = self.remaining_budget(task);
        let outcome = tokio::time::timeout(budget, self.pipelines.coordinate(task))
            .await
            .map_err(|_| EngineError::Pipeline("coordinator timed out".to_string()))??;

        for (sha, message) in &outcome.commits {
            self.store
                .record_commit(task.id.as_str(), sha, message, &self.clock.now_iso())?;
            self.lineage(task.id.as_str(), LineageKind::Commit, sha, "executing");
        }
        for artifact in &outcome.artifacts {
            self.lineage(task.id.as_str(), LineageKind::Artifact, artifact, "executing");
        }
        for request_id in &outcome.execution_request_ids {
            self.lineage(
                task.id.as_str(),
                LineageKind::ExecutionRequest,
                request_id,
                "executing",
            );
        }
        self.audit(
            task.id.as_str(),
            AuditLevel::Info,
            "coordinator_completed",
            serde_json::json!({
                "commits": outcome.commits.len(),
                "execution_requests": outcome.execution_request_ids.len(),
            }),
        );
        Ok(())
    }
}
