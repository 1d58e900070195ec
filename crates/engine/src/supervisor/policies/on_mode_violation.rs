// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy for `mode.violation`: audit minor violations, assign a guardian
//! for serious ones.

use crate::error::EngineError;
use crate::risk::{Finding, Severity};
use crate::supervisor::policy::{Policy, PolicyCtx, PolicyDecision, PolicyVerdict};
use fm_storage::InboxRow;

const SOURCE: &str = "on_mode_violation";

/// Handles reported mode violations.
#[derive(Default)]
pub struct OnModeViolation;

impl Policy for OnModeViolation {
    fn name(&self) -> &str {
        SOURCE
    }

    fn evaluate(
        &self,
        _ctx: &PolicyCtx<'_>,
        event: &InboxRow,
    ) -> Result<PolicyDecision, EngineError> {
        let severity_str = event
            .payload
            .get("severity")
            .and_then(|v| v.as_str())
            .unwrap_or("warning");
        let rule = event
            .payload
            .get("rule")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        let severity = match severity_str {
            "critical" => Severity::Critical,
            "error" => Severity::High,
            "warning" => Severity::Medium,
            _ => Severity::Low,
        };
        let finding = Finding::new(
            "mode_violation",
            severity,
            format!("mode violation of {rule} ({severity_str})"),
            SOURCE,
        )
        .with_evidence(vec![rule.to_string()]);

        let decision = if severity.is_blocking() {
            // A guardian verifies before the task may proceed.
            PolicyDecision {
                verdict: PolicyVerdict::RequireReview,
                reason: format!("guardian assigned for {severity_str} violation of {rule}"),
                findings: vec![finding],
                confidence: 0.9,
            }
        } else {
            PolicyDecision::allow(format!("{severity_str} violation audited"))
                .with_findings(vec![finding])
        };
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "on_mode_violation_tests.rs"]
mod tests;
