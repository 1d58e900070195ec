// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The planning phase: route verification, plan generation, the plan
//! artifact and checkpoint, and the pause-gate decision.

use crate::artifacts::OpenPlanArtifact;
use crate::error::EngineError;
use crate::runner::{payload, RunCtx, TaskRunner};
use fm_core::{
    AuditLevel, Clock, Evidence, EvidencePack, EventKind, ExitReason, IdGen, LineageKind,
    PauseCheckpoint, PauseMetadata, RerouteReason, Task, TaskStatus, WorkItem,
};
use fm_gates::can_pause_at;
use serde_json::{Map, Value};

impl<C: Clock, G: IdGen> TaskRunner<C, G> {
    pub(crate) async fn drive_planning(
        &self,
        ctx: &mut RunCtx,
        task: &Task,
    ) -> Result<Option<ExitReason>, EngineError> {
        if ctx.skip_planning {
            return self.resume_planned(ctx, task);
        }

        self.verify_route(task).await?;
        // Reload: the route may have changed.
        let task = self
            .store
            .get_task(task.id.as_str())?
            .ok_or_else(|| EngineError::TaskNotFound(task.id.to_string()))?;

        // The pipeline call is bounded by the remaining hard-timeout
        // budget so a hung planner cannot outlive the task.
        let budget = self.remaining_budget(&task);
        let outcome =
            match tokio::time::timeout(budget, self.pipelines.plan(&task)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Budget exhausted mid-plan. The timeout path writes
                    // the warning and terminal error in order.
                    if let Some(exit) = self.check_timeout(&task)? {
                        return Ok(Some(exit));
                    }
                    self.warn_timeout_once(&task, task.metadata.timeout.hard_ms)?;
                    self.audit(
                        task.id.as_str(),
                        AuditLevel::Error,
                        "timeout_exceeded",
                        serde_json::json!({"phase": "planning"}),
                    );
                    self.fail_if_running(task.id.as_str());
                    return Ok(Some(ExitReason::Timeout));
                }
            };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.audit(
                    task.id.as_str(),
                    AuditLevel::Error,
                    "planning_failed",
                    serde_json::json!({"error": e.to_string()}),
                );
                self.fail_if_running(task.id.as_str());
                self.emit(
                    EventKind::TaskFailed,
                    task.id.as_str(),
                    payload(&[("error", Value::String(e.to_string()))]),
                );
                return Ok(Some(ExitReason::FatalError));
            }
        };

        let pipeline_ref = self.id_gen.next();
        self.lineage(task.id.as_str(), LineageKind::Pipeline, &pipeline_ref, "planning");

        let plan_path = self.artifacts.write_open_plan(
            task.id.as_str(),
            &OpenPlanArtifact {
                task_id: task.id.to_string(),
                generated_at: self.clock.now_iso(),
                pipeline_status: "completed".to_string(),
                pipeline_summary: outcome.summary.clone(),
                stages: outcome.stages.clone(),
            },
        )?;
        self.lineage(
            task.id.as_str(),
            LineageKind::Artifact,
            &plan_path.to_string_lossy(),
            "planning",
        );

        // Checkpoint: planning survives a crash from here on.
        let step = self.steps.begin_step(
            task.id.as_str(),
            "planning_complete",
            serde_json::json!({
                "summary": outcome.summary,
                "work_items": outcome.work_items,
            }),
            None,
        );
        self.steps.commit_step(
            &step,
            EvidencePack::require_all(vec![Evidence::ArtifactExists {
                path: plan_path.to_string_lossy().into_owned(),
                artifact_type: "json".to_string(),
            }]),
        )?;

        // Declared work items land in metadata for the executing phase.
        let mut metadata = task.metadata.clone();
        if !outcome.work_items.is_empty() {
            metadata.work_items = outcome.work_items.clone();
        }
        self.store
            .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        self.emit(
            EventKind::TaskProgress,
            task.id.as_str(),
            payload(&[
                ("step", Value::String("planning".to_string())),
                ("work_items", Value::from(outcome.work_items.len())),
            ]),
        );

        // A supervisor-requested pause behaves like a plan-declared one.
        let pause_point = outcome
            .pause_checkpoint
            .clone()
            .or_else(|| metadata.pause.is_paused().then(|| "open_plan".to_string()));

        match pause_point {
            None => {
                self.set_status(&task.id, TaskStatus::Executing)?;
                Ok(None)
            }
            Some(checkpoint) => match can_pause_at(&checkpoint, task.run_mode) {
                Ok(true) => {
                    let mut metadata = self
                        .store
                        .get_task(task.id.as_str())?
                        .map(|t| t.metadata)
                        .unwrap_or_default();
                    metadata.pause =
                        PauseMetadata::awaiting(PauseCheckpoint::OpenPlan, "plan awaiting approval");
                    self.store.set_task_metadata(
                        task.id.as_str(),
                        &metadata,
                        self.clock.epoch_ms(),
                    )?;
                    self.set_status(&task.id, TaskStatus::AwaitingApproval)?;
                    self.lineage(
                        task.id.as_str(),
                        LineageKind::PauseCheckpoint,
                        &checkpoint,
                        "planning",
                    );
                    self.emit(
                        EventKind::TaskPaused,
                        task.id.as_str(),
                        payload(&[("checkpoint", Value::String(checkpoint))]),
                    );
                    Ok(None)
                }
                Ok(false) => {
                    // Autonomous-blocked red line.
                    self.audit(
                        task.id.as_str(),
                        AuditLevel::Error,
                        "autonomous_blocked",
                        serde_json::json!({
                            "message":
                                "AUTONOMOUS mode task blocked: Cannot proceed without approval checkpoint",
                            "checkpoint": checkpoint,
                        }),
                    );
                    self.set_status(&task.id, TaskStatus::Blocked)?;
                    self.emit(
                        EventKind::TaskFailed,
                        task.id.as_str(),
                        payload(&[("error", Value::String("autonomous task blocked".into()))]),
                    );
                    Ok(Some(ExitReason::Blocked))
                }
                Err(violation) => {
                    self.audit(
                        task.id.as_str(),
                        AuditLevel::Error,
                        "pause_gate_violation",
                        serde_json::json!({"error": violation.to_string()}),
                    );
                    self.fail_if_running(task.id.as_str());
                    Ok(Some(ExitReason::FatalError))
                }
            },
        }
    }

    /// Recovery path: a verified `planning_complete` checkpoint lets the
    /// task advance without re-running the planning pipeline.
    fn resume_planned(
        &self,
        ctx: &mut RunCtx,
        task: &Task,
    ) -> Result<Option<ExitReason>, EngineError> {
        ctx.skip_planning = false;
        self.audit(
            task.id.as_str(),
            AuditLevel::Info,
            "planning_restored_from_checkpoint",
            serde_json::json!({}),
        );
        self.set_status(&task.id, TaskStatus::Executing)?;
        Ok(None)
    }

    /// Verify the stored route plan against adapter health and walk the
    /// fallback chain when the primary is unreachable.
    async fn verify_route(&self, task: &Task) -> Result<(), EngineError> {
        let Some(plan) = task.metadata.route_plan.clone() else {
            return Ok(());
        };

        let mut current = plan;
        let mut rerouted = false;
        loop {
            let (healthy, reason) = match self.registry.get(&current.primary) {
                Ok(adapter) => {
                    let health = adapter.health_check().await;
                    (health.status.is_healthy(), RerouteReason::ProviderUnreachable)
                }
                Err(_) => (false, RerouteReason::ProviderNotConfigured),
            };
            if healthy {
                break;
            }
            let Some(next) = current.rerouted() else {
                self.audit(
                    task.id.as_str(),
                    AuditLevel::Warn,
                    "route_fallbacks_exhausted",
                    serde_json::json!({"primary": current.primary}),
                );
                break;
            };
            self.audit(
                task.id.as_str(),
                AuditLevel::Warn,
                "task_rerouted",
                serde_json::json!({
                    "from": current.primary,
                    "to": next.primary,
                    "reason": reason.as_str(),
                }),
            );
            let mut map = Map::new();
            map.insert("from".to_string(), Value::String(current.primary.clone()));
            map.insert("to".to_string(), Value::String(next.primary.clone()));
            map.insert("reason".to_string(), Value::String(reason.as_str().to_string()));
            map.insert(
                "fallback_chain".to_string(),
                serde_json::to_value(&next.fallback_chain)?,
            );
            self.emit(EventKind::TaskRerouted, task.id.as_str(), map);
            self.lineage(
                task.id.as_str(),
                LineageKind::Pipeline,
                &format!("reroute:{}->{}", current.primary, next.primary),
                "planning",
            );
            current = next;
            rerouted = true;
        }

        if rerouted {
            let mut metadata = task.metadata.clone();
            current.verified_at = Some(self.clock.now_iso());
            metadata.route_plan = Some(current);
            self.store
                .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        }
        Ok(())
    }

    // Work items restored during recovery come from the checkpoint
    // snapshot when planning is skipped but metadata was lost.
    pub(crate) fn restore_work_items(
        &self,
        task_id: &str,
        snapshot: &Value,
    ) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id)? else {
            return Ok(());
        };
        if !task.metadata.work_items.is_empty() {
            return Ok(());
        }
        let Some(items) = snapshot.get("work_items") else {
            return Ok(());
        };
        let items: Vec<WorkItem> = serde_json::from_value(items.clone())?;
        if items.is_empty() {
            return Ok(());
        }
        let mut metadata = task.metadata;
        metadata.work_items = items;
        self.store
            .set_task_metadata(task_id, &metadata, self.clock.epoch_ms())?;
        Ok(())
    }
}
