// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy contract: one inbox event in, one decision out.

use crate::error::EngineError;
use crate::risk::{Finding, Severity};
use fm_storage::{InboxRow, StoreTx};
use serde::Serialize;
use std::fmt;

/// What a policy decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyVerdict {
    Allow,
    Pause,
    Block,
    /// Recommendation only: the task lifecycle performs the retry.
    Retry,
    RequireReview,
}

impl PolicyVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyVerdict::Allow => "ALLOW",
            PolicyVerdict::Pause => "PAUSE",
            PolicyVerdict::Block => "BLOCK",
            PolicyVerdict::Retry => "RETRY",
            PolicyVerdict::RequireReview => "REQUIRE_REVIEW",
        }
    }
}

impl fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy's full output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyDecision {
    pub verdict: PolicyVerdict,
    pub reason: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    pub confidence: f64,
}

impl PolicyDecision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            verdict: PolicyVerdict::Allow,
            reason: reason.into(),
            findings: Vec::new(),
            confidence: 0.9,
        }
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    /// Highest finding severity, if any findings exist.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Evaluation context: the open transaction plus the evaluation clock.
pub struct PolicyCtx<'a> {
    pub tx: &'a StoreTx<'a>,
    pub now_iso: String,
    pub now_ms: u64,
}

/// A supervisor policy. Evaluation runs inside the same transaction as
/// the inbox status flip, so a decision is atomic with its state change.
pub trait Policy: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &PolicyCtx<'_>, event: &InboxRow) -> Result<PolicyDecision, EngineError>;
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
