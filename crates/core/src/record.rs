// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Immutable, hash-sealed governance decision records.
//!
//! `record_hash` covers a fixed field set serialized as canonical JSON
//! (recursively sorted keys), so any later mutation of those fields is
//! detectable by recomputation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Raised when a stored record's hash no longer matches its fields.
#[derive(Debug, Error)]
#[error("decision record {decision_id} failed integrity check")]
pub struct IntegrityError {
    pub decision_id: String,
}

/// What kind of evaluation produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Navigation,
    Compare,
    Health,
    Policy,
}

impl DecisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionType::Navigation => "NAVIGATION",
            DecisionType::Compare => "COMPARE",
            DecisionType::Health => "HEALTH",
            DecisionType::Policy => "POLICY",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final governance verdict. Ordered least to most restrictive, so
/// "most restrictive wins" is a plain `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceVerdict {
    Allow,
    Warn,
    RequireSignoff,
    Block,
}

impl GovernanceVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovernanceVerdict::Allow => "ALLOW",
            GovernanceVerdict::Warn => "WARN",
            GovernanceVerdict::RequireSignoff => "REQUIRE_SIGNOFF",
            GovernanceVerdict::Block => "BLOCK",
        }
    }

    /// The more restrictive of the two.
    pub fn most_restrictive(self, other: GovernanceVerdict) -> GovernanceVerdict {
        self.max(other)
    }
}

impl fmt::Display for GovernanceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionRecordStatus {
    #[default]
    Pending,
    Approved,
    Blocked,
    Signed,
    Failed,
}

impl DecisionRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionRecordStatus::Pending => "PENDING",
            DecisionRecordStatus::Approved => "APPROVED",
            DecisionRecordStatus::Blocked => "BLOCKED",
            DecisionRecordStatus::Signed => "SIGNED",
            DecisionRecordStatus::Failed => "FAILED",
        }
    }
}

/// A governance rule that fired during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrigger {
    pub rule_id: String,
    pub rule_name: String,
    pub action: GovernanceVerdict,
    pub rationale: String,
}

/// A signed acknowledgement attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSignoff {
    pub signoff_id: String,
    pub decision_id: String,
    pub signed_by: String,
    /// ISO-8601 UTC timestamp.
    pub ts: String,
    pub note: String,
}

/// One immutable governance verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub decision_type: DecisionType,
    /// The seed entity the evaluation started from (task id, snapshot id,
    /// health window, ...).
    pub seed: String,
    pub inputs: Value,
    pub outputs: Value,
    #[serde(default)]
    pub rules_triggered: Vec<RuleTrigger>,
    pub final_verdict: GovernanceVerdict,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// ISO-8601 UTC timestamp.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signoff: Option<DecisionSignoff>,
    #[serde(default)]
    pub status: DecisionRecordStatus,
    pub record_hash: String,
}

impl DecisionRecord {
    /// Build a record and seal it with its hash.
    #[allow(clippy::too_many_arguments)]
    pub fn sealed(
        decision_id: String,
        decision_type: DecisionType,
        seed: String,
        inputs: Value,
        outputs: Value,
        rules_triggered: Vec<RuleTrigger>,
        final_verdict: GovernanceVerdict,
        confidence: f64,
        timestamp: String,
    ) -> Self {
        let mut record = Self {
            decision_id,
            decision_type,
            seed,
            inputs,
            outputs,
            rules_triggered,
            final_verdict,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
            signoff: None,
            status: DecisionRecordStatus::Pending,
            record_hash: String::new(),
        };
        record.record_hash = record.compute_hash();
        record
    }

    /// SHA-256 over the canonical JSON of the sealed field set:
    /// `[decision_id, decision_type, seed, inputs, outputs,
    /// rules_triggered, timestamp]`.
    pub fn compute_hash(&self) -> String {
        let rules: Vec<Value> = self
            .rules_triggered
            .iter()
            .map(|r| {
                serde_json::json!({
                    "rule_id": r.rule_id,
                    "rule_name": r.rule_name,
                    "action": r.action.as_str(),
                    "rationale": r.rationale,
                })
            })
            .collect();
        let subject = serde_json::json!({
            "decision_id": self.decision_id,
            "decision_type": self.decision_type.as_str(),
            "seed": self.seed,
            "inputs": self.inputs,
            "outputs": self.outputs,
            "rules_triggered": rules,
            "timestamp": self.timestamp,
        });
        let canonical = canonical_json(&subject);
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{digest:x}")
    }

    /// Recompute the hash and compare with the stored value.
    pub fn verify_integrity(&self) -> Result<(), IntegrityError> {
        if self.compute_hash() == self.record_hash {
            Ok(())
        } else {
            Err(IntegrityError {
                decision_id: self.decision_id.clone(),
            })
        }
    }
}

/// Serialize a JSON value with recursively sorted object keys.
///
/// Array order is preserved; only object key order is normalised.
pub fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    if let Some(v) = map.get(*key) {
                        write(v, out);
                    }
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            other => out.push_str(&other.to_string()),
        }
    }
    let mut out = String::new();
    write(value, &mut out);
    out
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
