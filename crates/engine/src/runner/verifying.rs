// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The verifying phase: DONE gates decide between succeeded and a
//! re-planning round with the failure context attached.

use crate::error::EngineError;
use crate::runner::{payload, RunCtx, TaskRunner};
use fm_core::{
    AuditLevel, Clock, EventKind, ExitReason, GateFailureContext, IdGen, LineageKind, Task,
    TaskStatus,
};
use serde_json::Value;

impl<C: Clock, G: IdGen> TaskRunner<C, G> {
    pub(crate) async fn drive_verifying(
        &self,
        _ctx: &mut RunCtx,
        task: &Task,
    ) -> Result<Option<ExitReason>, EngineError> {
        let attempt = task
            .metadata
            .gate_failure_context
            .as_ref()
            .map(|c| c.attempt)
            .unwrap_or(0)
            + 1;
        let gates = task.metadata.gates.clone();

        let result = self
            .gates
            .run_gates(task.id.as_str(), &gates, self.clock.now_iso())
            .await?;
        let artifact = self
            .artifacts
            .write_gate_results(task.id.as_str(), &result, attempt)?;
        self.lineage(
            task.id.as_str(),
            LineageKind::GateResult,
            &artifact.to_string_lossy(),
            "verifying",
        );

        if result.all_passed() {
            self.audit(
                task.id.as_str(),
                AuditLevel::Info,
                "gates_passed",
                serde_json::json!({"gates": gates, "attempt": attempt}),
            );
            self.emit(
                EventKind::GatePassed,
                task.id.as_str(),
                payload(&[("attempt", Value::from(attempt))]),
            );
            self.set_status(&task.id, TaskStatus::Succeeded)?;
            self.emit(EventKind::TaskCompleted, task.id.as_str(), Default::default());
            return Ok(Some(ExitReason::Done));
        }

        // Any failure: back to planning with the context the next
        // planning iteration needs.
        let failure = result
            .first_failure()
            .ok_or_else(|| EngineError::Pipeline("gate run failed without a failure".into()))?;
        let summary = if failure.stderr.trim().is_empty() {
            failure.stdout.trim().to_string()
        } else {
            failure.stderr.trim().to_string()
        };
        let context = GateFailureContext {
            gate_name: failure.gate_name.clone(),
            exit_code: failure.exit_code,
            summary,
            attempt,
        };
        self.audit(
            task.id.as_str(),
            AuditLevel::Warn,
            "gate_failed",
            serde_json::json!({
                "gate": context.gate_name,
                "exit_code": context.exit_code,
                "attempt": attempt,
            }),
        );
        self.emit(
            EventKind::GateFailed,
            task.id.as_str(),
            payload(&[
                ("gate", Value::String(context.gate_name.clone())),
                ("attempt", Value::from(attempt)),
            ]),
        );

        let Some(current) = self.store.get_task(task.id.as_str())? else {
            return Err(EngineError::TaskNotFound(task.id.to_string()));
        };
        let mut metadata = current.metadata;
        metadata.gate_failure_context = Some(context);
        // Work items re-derive from the revised plan.
        metadata.work_items.clear();
        self.store
            .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        self.set_status(&task.id, TaskStatus::Planning)?;
        Ok(None)
    }
}
