// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy for `task.created`: redline validation of attached declarative
//! specs, intent conflict checks, and initial risk screening.

use crate::error::EngineError;
use crate::risk::{Finding, Severity};
use crate::supervisor::policy::{Policy, PolicyCtx, PolicyDecision, PolicyVerdict};
use fm_gates::{validate_command, validate_role, validate_rule, CommandSpec, RoleSpec, RuleSpec};
use fm_storage::InboxRow;

const SOURCE: &str = "on_task_created";

/// Intent pairs that cannot coexist in one task.
const CONFLICTING_INTENTS: &[(&str, &str)] = &[
    ("refactor", "freeze"),
    ("delete", "preserve"),
    ("rollback", "release"),
];

/// Evaluates newly created tasks before the runner picks them up.
#[derive(Default)]
pub struct OnTaskCreated;

impl OnTaskCreated {
    fn spec_findings(payload: &serde_json::Value) -> Vec<Finding> {
        let mut findings = Vec::new();
        let docs = |key: &str| -> Vec<String> {
            payload
                .get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };

        for doc in docs("roles") {
            match RoleSpec::parse(&doc) {
                Ok(spec) => {
                    if let Err(violations) = validate_role(&spec) {
                        for violation in violations {
                            findings.push(
                                Finding::new("redline", Severity::High, violation.to_string(), SOURCE)
                                    .with_evidence(vec![violation.rule_id]),
                            );
                        }
                    }
                }
                Err(e) => findings.push(Finding::new(
                    "redline",
                    Severity::High,
                    format!("role spec unparseable: {e}"),
                    SOURCE,
                )),
            }
        }
        for doc in docs("commands") {
            match CommandSpec::parse(&doc) {
                Ok(spec) => {
                    if let Err(violations) = validate_command(&spec) {
                        for violation in violations {
                            findings.push(
                                Finding::new("redline", Severity::High, violation.to_string(), SOURCE)
                                    .with_evidence(vec![violation.rule_id]),
                            );
                        }
                    }
                }
                Err(e) => findings.push(Finding::new(
                    "redline",
                    Severity::High,
                    format!("command spec unparseable: {e}"),
                    SOURCE,
                )),
            }
        }
        for doc in docs("rules") {
            match RuleSpec::parse(&doc) {
                Ok(spec) => {
                    if let Err(violations) = validate_rule(&spec) {
                        for violation in violations {
                            findings.push(
                                Finding::new("redline", Severity::High, violation.to_string(), SOURCE)
                                    .with_evidence(vec![violation.rule_id]),
                            );
                        }
                    }
                }
                Err(e) => findings.push(Finding::new(
                    "redline",
                    Severity::High,
                    format!("rule spec unparseable: {e}"),
                    SOURCE,
                )),
            }
        }
        findings
    }

    fn intent_findings(payload: &serde_json::Value) -> Vec<Finding> {
        let Some(intents) = payload.get("intent_set").and_then(|v| v.as_array()) else {
            return Vec::new();
        };
        let intents: Vec<&str> = intents.iter().filter_map(|v| v.as_str()).collect();
        let mut findings = Vec::new();
        for (a, b) in CONFLICTING_INTENTS {
            if intents.contains(a) && intents.contains(b) {
                findings.push(
                    Finding::new(
                        "intent_conflict",
                        Severity::High,
                        format!("conflicting intents: '{a}' vs '{b}'"),
                        SOURCE,
                    )
                    .with_evidence(vec![a.to_string(), b.to_string()]),
                );
            }
        }
        findings
    }

    fn risk_findings(payload: &serde_json::Value) -> Vec<Finding> {
        let Some(matrix) = payload.get("risk_matrix").and_then(|v| v.as_object()) else {
            return Vec::new();
        };
        let mut highest: Option<(&str, Severity)> = None;
        for (dimension, level) in matrix {
            let severity = match level.as_str() {
                Some("critical") => Severity::Critical,
                Some("high") => Severity::High,
                Some("medium") => Severity::Medium,
                _ => Severity::Low,
            };
            if highest.map(|(_, s)| severity > s).unwrap_or(true) {
                highest = Some((dimension.as_str(), severity));
            }
        }
        match highest {
            Some((dimension, severity)) if severity >= Severity::Medium => vec![Finding::new(
                "risk",
                severity,
                format!("risk matrix peaks at {severity} ({dimension})"),
                SOURCE,
            )],
            _ => Vec::new(),
        }
    }
}

impl Policy for OnTaskCreated {
    fn name(&self) -> &str {
        SOURCE
    }

    fn evaluate(
        &self,
        _ctx: &PolicyCtx<'_>,
        event: &InboxRow,
    ) -> Result<PolicyDecision, EngineError> {
        let mut findings = Self::spec_findings(&event.payload);
        findings.extend(Self::intent_findings(&event.payload));
        findings.extend(Self::risk_findings(&event.payload));

        let blocking = findings.iter().filter(|f| f.severity.is_blocking()).count();
        let medium = findings
            .iter()
            .filter(|f| f.severity == Severity::Medium)
            .count();

        let decision = if blocking > 0 {
            PolicyDecision {
                verdict: PolicyVerdict::Block,
                reason: format!("task blocked: {blocking} high/critical findings"),
                findings,
                confidence: 0.95,
            }
        } else if medium > 0 {
            PolicyDecision {
                verdict: PolicyVerdict::Pause,
                reason: format!("task paused at open_plan: {medium} medium findings"),
                findings,
                confidence: 0.8,
            }
        } else {
            PolicyDecision::allow("no findings on creation").with_findings(findings)
        };

        tracing::info!(
            task = %event.task_id,
            verdict = %decision.verdict,
            findings = decision.findings.len(),
            "task.created evaluated"
        );
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "on_task_created_tests.rs"]
mod tests;
