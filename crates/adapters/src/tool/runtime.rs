// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime wrapper around tool adapters.
//!
//! Enforces the red lines the adapters themselves cannot be trusted with:
//! mock gating, the diff-only invariant (H3), mandatory error categories
//! and normalised endpoints on persisted results (H2), and a tool audit
//! event on every call.

use crate::tool::diff::validate_diff;
use crate::tool::{ErrorCategory, OutputKind, ToolAdapter, ToolResult, ToolStatus, ToolTask};
use crate::AdapterError;
use std::sync::Arc;

/// Process-wide gate flag. Mock output is only ever served when this is
/// set AND the caller passed `allow_mock` — either alone is not enough.
pub const GATE_MODE_ENV: &str = "FOREMAN_GATE_MODE";

/// Whether the process-wide gate mode is enabled.
pub fn gate_mode_enabled() -> bool {
    matches!(
        std::env::var(GATE_MODE_ENV).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Reduce an endpoint to `scheme://host[:port]` — no userinfo, path, or
/// query ever reaches evidence.
pub fn normalize_endpoint(raw: &str) -> String {
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, raw),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    // Drop userinfo if present.
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    match scheme {
        Some(scheme) => format!("{scheme}://{host_port}"),
        None => host_port.to_string(),
    }
}

/// Sink for the audit event the runtime writes on every call.
///
/// Implemented by the engine over the store; kept as a trait here so the
/// adapter layer stays free of persistence concerns.
pub trait ToolAuditSink: Send + Sync {
    fn tool_event(&self, task_id: &str, payload: serde_json::Value);
}

/// No-op sink for contexts without an audit stream.
pub struct NullAuditSink;

impl ToolAuditSink for NullAuditSink {
    fn tool_event(&self, _task_id: &str, _payload: serde_json::Value) {}
}

/// Wraps an adapter call with invariant enforcement and evidence.
pub struct ToolRuntime {
    audit: Arc<dyn ToolAuditSink>,
    gate_mode: bool,
}

impl Default for ToolRuntime {
    fn default() -> Self {
        Self::new(Arc::new(NullAuditSink))
    }
}

impl ToolRuntime {
    pub fn new(audit: Arc<dyn ToolAuditSink>) -> Self {
        Self {
            audit,
            gate_mode: gate_mode_enabled(),
        }
    }

    /// Override the gate flag (tests; the env var is process-global).
    pub fn with_gate_mode(mut self, enabled: bool) -> Self {
        self.gate_mode = enabled;
        self
    }

    /// Run the adapter and finalise its result.
    pub async fn run(
        &self,
        adapter: &Arc<dyn ToolAdapter>,
        task: &ToolTask,
        allow_mock: bool,
    ) -> Result<ToolResult, AdapterError> {
        // Mock is only legal when both the caller and the process say so.
        let effective_mock = allow_mock && self.gate_mode;
        let mut result = adapter.run(task, effective_mock).await?;
        self.finalize(task, &mut result);

        self.audit.tool_event(
            &task.task_id,
            serde_json::json!({
                "tool": result.tool,
                "status": result.status,
                "output_kind": result.output_kind,
                "tool_run_id": result.tool_run_id,
                "endpoint": result.endpoint,
                "error_category": result.error_category,
                "files_touched": result.files_touched.len(),
                "mock_used": result.mock_used,
            }),
        );
        Ok(result)
    }

    /// Apply H2/H3 and the power-boundary checks in place.
    fn finalize(&self, task: &ToolTask, result: &mut ToolResult) {
        // Power boundary: a tool claiming it wrote or committed is a red
        // line, not a warning.
        if result.wrote_files || result.committed {
            tracing::error!(tool = %result.tool, "tool declared working-tree mutation");
            result.status = ToolStatus::Failed;
            result.error_message = Some(
                "tool declared wrote_files/committed; tools may only produce diffs".to_string(),
            );
            result.wrote_files = false;
            result.committed = false;
        }

        // Mock output that slipped through without both gates is a failure.
        if result.mock_used && !self.gate_mode {
            result.status = ToolStatus::Failed;
            result.error_message =
                Some("mock output produced outside gate mode".to_string());
        }

        // H3: a diff-kind result must carry a real diff.
        if result.output_kind == OutputKind::Diff && !result.status.is_failure() {
            let validation = validate_diff(&result.diff, &task.allowed_paths, &task.forbidden_paths);
            if !validation.is_valid {
                tracing::warn!(
                    tool = %result.tool,
                    errors = ?validation.errors,
                    "diff validation failed"
                );
                result.status = ToolStatus::Failed;
                result.error_message = Some(format!(
                    "diff validation failed: {}",
                    validation.errors.join("; ")
                ));
            } else if result.files_touched.is_empty() {
                result.files_touched = validation.files_checked.clone();
            }
            result.diff_validation = Some(validation);
        }

        // H2: persisted failures always carry a category, and endpoints
        // are host-only.
        if result.status.is_failure() && result.error_category.is_none() {
            result.error_category = Some(ErrorCategory::Runtime);
        }
        if let Some(endpoint) = result.endpoint.take() {
            result.endpoint = Some(normalize_endpoint(&endpoint));
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
