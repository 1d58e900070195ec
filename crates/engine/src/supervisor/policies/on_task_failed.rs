// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy for `task.failed`: failure attribution and retry advice.
//!
//! The supervisor never performs the retry itself — RETRY is a
//! recommendation the task lifecycle acts on; BLOCK marks the task.

use crate::error::EngineError;
use crate::risk::{Finding, Severity};
use crate::supervisor::policy::{Policy, PolicyCtx, PolicyDecision, PolicyVerdict};
use fm_storage::InboxRow;

const SOURCE: &str = "on_task_failed";

/// Error types that must never be retried.
const NON_RETRYABLE_ERRORS: &[&str] = &[
    "redline_violation",
    "permission_denied",
    "invalid_config",
    "quota_exceeded",
    "auth_failed",
];

/// Error types that are safe to retry.
const RETRYABLE_ERRORS: &[&str] = &[
    "network_timeout",
    "connection_refused",
    "rate_limited",
    "service_unavailable",
    "temporary_failure",
];

const NON_RETRYABLE_KEYWORDS: &[&str] = &[
    "permission denied",
    "access denied",
    "invalid",
    "forbidden",
    "unauthorized",
    "quota exceeded",
    "redline",
];

const RETRYABLE_KEYWORDS: &[&str] = &[
    "timeout",
    "connection",
    "network",
    "rate limit",
    "unavailable",
    "temporary",
];

/// Classifies failures and recommends retry or block.
#[derive(Default)]
pub struct OnTaskFailed;

impl OnTaskFailed {
    /// Explicit lists first, keyword heuristics second, conservative
    /// default: not retryable.
    fn can_retry(error_type: Option<&str>, error_message: &str) -> bool {
        if let Some(error_type) = error_type {
            if NON_RETRYABLE_ERRORS.contains(&error_type) {
                return false;
            }
            if RETRYABLE_ERRORS.contains(&error_type) {
                return true;
            }
        }
        let lower = error_message.to_lowercase();
        if NON_RETRYABLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return false;
        }
        if RETRYABLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return true;
        }
        false
    }
}

impl Policy for OnTaskFailed {
    fn name(&self) -> &str {
        SOURCE
    }

    fn evaluate(
        &self,
        ctx: &PolicyCtx<'_>,
        event: &InboxRow,
    ) -> Result<PolicyDecision, EngineError> {
        let error_message = event
            .payload
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        let error_type = event.payload.get("error_type").and_then(|v| v.as_str());

        let mut findings = vec![Finding::new(
            "failure",
            Severity::High,
            format!("task failed: {error_message}"),
            SOURCE,
        )
        .with_evidence(vec![error_message.to_string()])];

        let (retry_count, max_retries) = match ctx.tx.get_task(&event.task_id)? {
            Some(task) => (task.metadata.retry_count, task.metadata.max_retries),
            None => (0, 0),
        };

        let can_retry = Self::can_retry(error_type, error_message);
        let decision = if can_retry && retry_count < max_retries {
            PolicyDecision {
                verdict: PolicyVerdict::Retry,
                reason: format!(
                    "retryable failure, attempt {}/{max_retries}",
                    retry_count + 1
                ),
                findings,
                confidence: 0.7,
            }
        } else {
            let reason = if can_retry {
                format!("max retries exceeded ({retry_count}/{max_retries})")
            } else {
                format!(
                    "non-retryable failure: {}",
                    error_type.unwrap_or("unclassified")
                )
            };
            findings.push(
                Finding::new("constraint", Severity::High, reason.clone(), SOURCE).with_evidence(
                    vec![
                        format!("retry_count={retry_count}"),
                        format!("max_retries={max_retries}"),
                    ],
                ),
            );
            PolicyDecision {
                verdict: PolicyVerdict::Block,
                reason,
                findings,
                confidence: 0.9,
            }
        };

        tracing::info!(
            task = %event.task_id,
            verdict = %decision.verdict,
            can_retry,
            retry_count,
            "task.failed evaluated"
        );
        Ok(decision)
    }
}

#[cfg(test)]
#[path = "on_task_failed_tests.rs"]
mod tests;
