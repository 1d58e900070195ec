// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Risk signal evaluation.
//!
//! Risk is an input to policies, never a verdict by itself. The scorer
//! posts explainable findings through [`AuditSink`]; it does not know what
//! consumes them, which keeps the scorer/timeline dependency one-way.

use fm_core::{AuditLevel, Clock, TaskId};
use fm_storage::Store;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One explainable policy finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub source: String,
}

impl Finding {
    pub fn new(
        category: &str,
        severity: Severity,
        description: impl Into<String>,
        source: &str,
    ) -> Self {
        Self {
            category: category.to_string(),
            severity,
            description: description.into(),
            evidence: Vec::new(),
            source: source.to_string(),
        }
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Observed runtime signals a policy re-evaluates after each step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskSignals {
    /// Fraction of recent operations that errored, 0..1.
    #[serde(default)]
    pub error_rate: f64,
    /// Fraction of the resource budget consumed, 0..1.
    #[serde(default)]
    pub resource_usage: f64,
    /// Security posture score, 0..1 where lower is worse.
    #[serde(default = "default_security_score")]
    pub security_score: f64,
}

fn default_security_score() -> f64 {
    1.0
}

/// Threshold set for signal evaluation.
pub const ERROR_RATE_HIGH: f64 = 0.3;
pub const RESOURCE_USAGE_MEDIUM: f64 = 0.9;
pub const SECURITY_SCORE_HIGH: f64 = 0.5;

impl RiskSignals {
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        Self {
            error_rate: payload
                .get("error_rate")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            resource_usage: payload
                .get("resource_usage")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0),
            security_score: payload
                .get("security_score")
                .and_then(|v| v.as_f64())
                .unwrap_or(1.0),
        }
    }

    /// Evaluate the signals against the thresholds.
    pub fn evaluate(&self, source: &str) -> Vec<Finding> {
        let mut findings = Vec::new();
        if self.error_rate > ERROR_RATE_HIGH {
            findings.push(
                Finding::new(
                    "reliability",
                    Severity::High,
                    format!("error rate {:.2} exceeds {ERROR_RATE_HIGH}", self.error_rate),
                    source,
                )
                .with_evidence(vec![format!("error_rate={}", self.error_rate)]),
            );
        }
        if self.resource_usage > RESOURCE_USAGE_MEDIUM {
            findings.push(
                Finding::new(
                    "resources",
                    Severity::Medium,
                    format!(
                        "resource usage {:.2} exceeds {RESOURCE_USAGE_MEDIUM}",
                        self.resource_usage
                    ),
                    source,
                )
                .with_evidence(vec![format!("resource_usage={}", self.resource_usage)]),
            );
        }
        if self.security_score < SECURITY_SCORE_HIGH {
            findings.push(
                Finding::new(
                    "security",
                    Severity::High,
                    format!(
                        "security score {:.2} below {SECURITY_SCORE_HIGH}",
                        self.security_score
                    ),
                    source,
                )
                .with_evidence(vec![format!("security_score={}", self.security_score)]),
            );
        }
        findings
    }
}

/// Sink findings are posted to. The scorer never reads back.
pub trait AuditSink: Send + Sync {
    fn post(&self, task_id: &TaskId, finding: &Finding);
}

/// Sink that writes findings to the task audit stream.
pub struct StoreAuditSink<C: Clock> {
    store: Store,
    clock: C,
}

impl<C: Clock> StoreAuditSink<C> {
    pub fn new(store: Store, clock: C) -> Self {
        Self { store, clock }
    }
}

impl<C: Clock> AuditSink for StoreAuditSink<C> {
    fn post(&self, task_id: &TaskId, finding: &Finding) {
        let level = if finding.severity.is_blocking() {
            AuditLevel::Warn
        } else {
            AuditLevel::Info
        };
        let payload = match serde_json::to_value(finding) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "finding serialization failed");
                return;
            }
        };
        if let Err(e) = self.store.audit(
            task_id,
            self.clock.now_iso(),
            level,
            "risk_finding",
            payload,
        ) {
            tracing::error!(error = %e, "audit sink write failed");
        }
    }
}

#[cfg(test)]
#[path = "risk_tests.rs"]
mod tests;
