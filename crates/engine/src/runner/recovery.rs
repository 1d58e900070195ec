// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint recovery at runner start.
//!
//! The latest checkpoint is re-verified; only evidence that still holds
//! makes it resumable. A failed verification logs and starts the run
//! from scratch — recovery is an optimisation, never a requirement.

use crate::error::EngineError;
use crate::runner::{payload, RunCtx, TaskRunner};
use fm_core::{AuditLevel, Clock, EventKind, IdGen, WorkItemStatus};
use serde_json::Value;

impl<C: Clock, G: IdGen> TaskRunner<C, G> {
    pub(crate) fn try_recover(&self, task_id: &str) -> Result<RunCtx, EngineError> {
        let mut ctx = RunCtx {
            iteration: 0,
            skip_planning: false,
        };

        let Some(checkpoint) = self.steps.latest(task_id)? else {
            return Ok(ctx);
        };

        let verified = match self.steps.verify_checkpoint(&checkpoint.checkpoint_id) {
            Ok(verified) => verified,
            Err(e) => {
                self.audit(
                    task_id,
                    AuditLevel::Warn,
                    "checkpoint_verification_error",
                    serde_json::json!({
                        "checkpoint_id": checkpoint.checkpoint_id,
                        "error": e.to_string(),
                    }),
                );
                return Ok(ctx);
            }
        };
        if !verified {
            self.audit(
                task_id,
                AuditLevel::Warn,
                "checkpoint_verification_failed",
                serde_json::json!({
                    "checkpoint_id": checkpoint.checkpoint_id,
                    "checkpoint_type": checkpoint.checkpoint_type,
                }),
            );
            return Ok(ctx);
        }

        match checkpoint.checkpoint_type.as_str() {
            "planning_complete" => {
                ctx.skip_planning = true;
                self.restore_work_items(task_id, &checkpoint.snapshot)?;
            }
            "work_item_complete" => {
                if let Some(item_id) = checkpoint.work_item_id.as_deref() {
                    self.mark_item_completed(task_id, item_id)?;
                }
            }
            "iteration_start" => {
                ctx.iteration = checkpoint
                    .snapshot
                    .get("iteration")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32;
            }
            other => {
                tracing::debug!(task = task_id, checkpoint_type = other, "no restore action");
            }
        }

        self.audit(
            task_id,
            AuditLevel::Info,
            "recovery_resumed_from_checkpoint",
            serde_json::json!({
                "checkpoint_id": checkpoint.checkpoint_id,
                "checkpoint_type": checkpoint.checkpoint_type,
                "sequence_number": checkpoint.sequence_number,
            }),
        );
        self.emit(
            EventKind::RecoveryResumed,
            task_id,
            payload(&[
                (
                    "checkpoint_id",
                    Value::String(checkpoint.checkpoint_id.clone()),
                ),
                (
                    "checkpoint_type",
                    Value::String(checkpoint.checkpoint_type.clone()),
                ),
            ]),
        );
        Ok(ctx)
    }

    fn mark_item_completed(&self, task_id: &str, item_id: &str) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id)? else {
            return Ok(());
        };
        let mut metadata = task.metadata;
        let mut changed = false;
        for item in metadata.work_items.iter_mut() {
            if item.id == *item_id && item.status != WorkItemStatus::Completed {
                item.status = WorkItemStatus::Completed;
                changed = true;
            }
        }
        if changed {
            self.store
                .set_task_metadata(task_id, &metadata, self.clock.epoch_ms())?;
        }
        Ok(())
    }
}
