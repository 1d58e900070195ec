// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint step tracking and evidence verification.
//!
//! Every major runner step opens with `begin_step` and closes with
//! `commit_step`, which makes the checkpoint durable with a dense
//! per-task sequence number. A checkpoint is resumable only while its
//! evidence pack still verifies against current state.

use crate::error::EngineError;
use fm_core::{Clock, Evidence, EvidencePack, EvidenceVerdict, IdGen};
use fm_storage::{CheckpointRow, Store};
use std::path::Path;

/// An open step, not yet durable.
#[derive(Debug, Clone)]
pub struct PendingStep {
    pub checkpoint_id: String,
    pub task_id: String,
    pub checkpoint_type: String,
    pub snapshot: serde_json::Value,
    pub work_item_id: Option<String>,
}

/// Tracks checkpoints for the runner.
#[derive(Clone)]
pub struct StepTracker<C: Clock, G: IdGen> {
    store: Store,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> StepTracker<C, G> {
    pub fn new(store: Store, clock: C, id_gen: G) -> Self {
        Self {
            store,
            clock,
            id_gen,
        }
    }

    /// Open a step. Nothing is persisted until `commit_step`.
    pub fn begin_step(
        &self,
        task_id: &str,
        checkpoint_type: &str,
        snapshot: serde_json::Value,
        work_item_id: Option<&str>,
    ) -> PendingStep {
        PendingStep {
            checkpoint_id: self.id_gen.next(),
            task_id: task_id.to_string(),
            checkpoint_type: checkpoint_type.to_string(),
            snapshot,
            work_item_id: work_item_id.map(str::to_string),
        }
    }

    /// Commit the step with its evidence; returns the sequence number.
    pub fn commit_step(
        &self,
        step: &PendingStep,
        evidence: EvidencePack,
    ) -> Result<u64, EngineError> {
        let seq = self.store.append_checkpoint(
            &step.checkpoint_id,
            &step.task_id,
            &step.checkpoint_type,
            &step.snapshot,
            &evidence,
            step.work_item_id.as_deref(),
            &self.clock.now_iso(),
        )?;
        tracing::debug!(
            task = %step.task_id,
            checkpoint = %step.checkpoint_id,
            checkpoint_type = %step.checkpoint_type,
            seq,
            "checkpoint committed"
        );
        Ok(seq)
    }

    /// Re-check every evidence item against current state. Stamps the
    /// checkpoint verified on success.
    pub fn verify_checkpoint(&self, checkpoint_id: &str) -> Result<bool, EngineError> {
        let Some(row) = self.store.get_checkpoint(checkpoint_id)? else {
            return Ok(false);
        };
        let verdicts = self.verify_pack(&row)?;
        let satisfied = row.evidence_pack.is_satisfied(&verdicts);
        if satisfied {
            self.store
                .mark_checkpoint_verified(checkpoint_id, &self.clock.now_iso())?;
        } else {
            tracing::warn!(
                task = %row.task_id,
                checkpoint = %checkpoint_id,
                ?verdicts,
                "checkpoint evidence no longer verifies"
            );
        }
        Ok(satisfied)
    }

    fn verify_pack(&self, row: &CheckpointRow) -> Result<Vec<EvidenceVerdict>, EngineError> {
        let mut verdicts = Vec::with_capacity(row.evidence_pack.items.len());
        for evidence in &row.evidence_pack.items {
            verdicts.push(self.verify_one(&row.task_id, evidence)?);
        }
        Ok(verdicts)
    }

    fn verify_one(
        &self,
        task_id: &str,
        evidence: &Evidence,
    ) -> Result<EvidenceVerdict, EngineError> {
        let verified = match evidence {
            Evidence::ArtifactExists { path, .. } => Path::new(path).exists(),
            Evidence::CommandExit { command, exit_code } => {
                // Re-running arbitrary commands at verify time is unsafe;
                // the tool ledger is the record of what actually ran.
                self.store
                    .tool_ledger_entries(task_id)?
                    .iter()
                    .any(|entry| {
                        entry.exit_code == *exit_code
                            && entry
                                .result
                                .get("command")
                                .and_then(|v| v.as_str())
                                .is_some_and(|c| c == command)
                    })
            }
            Evidence::DbRow {
                table,
                where_clause,
                ..
            } => self.store.row_exists(table, where_clause)?,
        };
        Ok(if verified {
            EvidenceVerdict::Verified
        } else {
            EvidenceVerdict::Failed
        })
    }

    /// The most recent checkpoint for a task, if any.
    pub fn latest(&self, task_id: &str) -> Result<Option<CheckpointRow>, EngineError> {
        Ok(self.store.latest_checkpoint(task_id)?)
    }
}

#[cfg(test)]
#[path = "steps_tests.rs"]
mod tests;
