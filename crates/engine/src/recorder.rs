// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The decision recorder: a content-addressed governance ledger.
//!
//! Every evaluation is synthesised into inputs/outputs, run through the
//! governance rules, sealed with a hash over the fixed field set, and
//! appended. The only permitted mutation is attaching a sign-off.

use crate::error::EngineError;
use fm_core::{
    Clock, DecisionRecord, DecisionSignoff, DecisionType, GovernanceVerdict, IdGen, RuleTrigger,
};
use fm_storage::{Store, StoreTx};
use serde_json::Value;
use thiserror::Error;

/// Env var carrying the administrative token for sign-off operations.
pub const ADMIN_TOKEN_ENV: &str = "FOREMAN_ADMIN_TOKEN";

/// Errors from sign-off operations.
#[derive(Debug, Error)]
pub enum SignoffError {
    #[error("admin token rejected")]
    TokenRejected,
    #[error("decision not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] fm_storage::StoreError),
}

/// Run the governance rules over a decision subject.
///
/// Returns the triggered rules and the final verdict — the most
/// restrictive of all triggered actions, defaulting to ALLOW.
pub fn apply_governance_rules(
    decision_type: DecisionType,
    _inputs: &Value,
    outputs: &Value,
) -> (Vec<RuleTrigger>, GovernanceVerdict) {
    let mut triggered = Vec::new();

    let policy_verdict = outputs.get("verdict").and_then(|v| v.as_str());
    if policy_verdict == Some("BLOCK") {
        triggered.push(RuleTrigger {
            rule_id: "GR-001".to_string(),
            rule_name: "policy_block_is_final".to_string(),
            action: GovernanceVerdict::Block,
            rationale: "policy evaluation blocked the subject".to_string(),
        });
    }
    if policy_verdict == Some("REQUIRE_REVIEW") {
        triggered.push(RuleTrigger {
            rule_id: "GR-002".to_string(),
            rule_name: "review_requires_signoff".to_string(),
            action: GovernanceVerdict::RequireSignoff,
            rationale: "policy requested human review".to_string(),
        });
    }

    let max_risk = outputs.get("max_risk_level").and_then(|v| v.as_str());
    if matches!(max_risk, Some("HIGH") | Some("CRITICAL")) {
        triggered.push(RuleTrigger {
            rule_id: "GR-003".to_string(),
            rule_name: "high_risk_requires_signoff".to_string(),
            action: GovernanceVerdict::RequireSignoff,
            rationale: format!("max risk level {}", max_risk.unwrap_or("HIGH")),
        });
    }

    if let Some(confidence) = outputs.get("avg_confidence").and_then(|v| v.as_f64()) {
        if confidence < 0.3 {
            triggered.push(RuleTrigger {
                rule_id: "GR-004".to_string(),
                rule_name: "low_confidence_warns".to_string(),
                action: GovernanceVerdict::Warn,
                rationale: format!("average confidence {confidence:.2} below 0.30"),
            });
        }
    }

    if decision_type == DecisionType::Health {
        if let Some(score) = outputs.get("current_health_score").and_then(|v| v.as_f64()) {
            if score < 40.0 {
                triggered.push(RuleTrigger {
                    rule_id: "GR-005".to_string(),
                    rule_name: "unhealthy_graph_warns".to_string(),
                    action: GovernanceVerdict::Warn,
                    rationale: format!("health score {score:.0} below 40"),
                });
            }
        }
    }

    let verdict = triggered
        .iter()
        .map(|t| t.action)
        .fold(GovernanceVerdict::Allow, GovernanceVerdict::most_restrictive);
    (triggered, verdict)
}

/// Appends immutable decision records.
#[derive(Clone)]
pub struct DecisionRecorder<C: Clock, G: IdGen> {
    store: Store,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> DecisionRecorder<C, G> {
    pub fn new(store: Store, clock: C, id_gen: G) -> Self {
        Self {
            store,
            clock,
            id_gen,
        }
    }

    /// Build a sealed record for the subject without persisting it.
    pub fn seal(
        &self,
        decision_type: DecisionType,
        seed: &str,
        inputs: Value,
        outputs: Value,
        confidence: f64,
    ) -> DecisionRecord {
        let (rules_triggered, final_verdict) =
            apply_governance_rules(decision_type, &inputs, &outputs);
        DecisionRecord::sealed(
            self.id_gen.next(),
            decision_type,
            seed.to_string(),
            inputs,
            outputs,
            rules_triggered,
            final_verdict,
            confidence,
            self.clock.now_iso(),
        )
    }

    /// Seal and append in one step.
    pub fn record(
        &self,
        decision_type: DecisionType,
        seed: &str,
        inputs: Value,
        outputs: Value,
        confidence: f64,
    ) -> Result<DecisionRecord, EngineError> {
        let record = self.seal(decision_type, seed, inputs, outputs, confidence);
        self.store.append_decision(&record)?;
        tracing::info!(
            decision = %record.decision_id,
            decision_type = %record.decision_type,
            verdict = %record.final_verdict,
            rules = record.rules_triggered.len(),
            "decision recorded"
        );
        Ok(record)
    }

    /// Seal and append inside an open transaction (supervisor path).
    pub fn record_in_tx(
        &self,
        tx: &StoreTx<'_>,
        decision_type: DecisionType,
        seed: &str,
        inputs: Value,
        outputs: Value,
        confidence: f64,
    ) -> Result<DecisionRecord, EngineError> {
        let record = self.seal(decision_type, seed, inputs, outputs, confidence);
        tx.append_decision(&record)?;
        Ok(record)
    }

    /// Recompute a stored record's hash; a mismatch is tamper.
    pub fn verify_integrity(&self, decision_id: &str) -> Result<(), EngineError> {
        let record = self
            .store
            .get_decision(decision_id)?
            .ok_or_else(|| EngineError::TaskNotFound(format!("decision {decision_id}")))?;
        record
            .verify_integrity()
            .map_err(|e| EngineError::Store(fm_storage::StoreError::Integrity(e.decision_id)))
    }

    /// Attach a signed acknowledgement. The admin token must match the
    /// process environment.
    pub fn sign(
        &self,
        decision_id: &str,
        signed_by: &str,
        note: &str,
        token: &str,
    ) -> Result<DecisionSignoff, SignoffError> {
        let expected = std::env::var(ADMIN_TOKEN_ENV).unwrap_or_default();
        if expected.is_empty() || token != expected {
            return Err(SignoffError::TokenRejected);
        }
        if self.store.get_decision(decision_id)?.is_none() {
            return Err(SignoffError::NotFound(decision_id.to_string()));
        }
        let signoff = DecisionSignoff {
            signoff_id: self.id_gen.next(),
            decision_id: decision_id.to_string(),
            signed_by: signed_by.to_string(),
            ts: self.clock.now_iso(),
            note: note.to_string(),
        };
        self.store.sign_decision(&signoff)?;
        Ok(signoff)
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
