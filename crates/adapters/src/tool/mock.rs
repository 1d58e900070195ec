// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mock results for gate mode.
//!
//! Served only when both the process-wide gate flag and the caller's
//! `allow_mock` agree; a mock result is always labelled as such.

use crate::tool::{OutputKind, Provider, ToolResult, ToolStatus, ToolTask};

/// A deterministic mock result satisfying the diff-only contract.
pub fn mock_result(
    tool: &str,
    task: &ToolTask,
    run_id: &str,
    provider: Provider,
    reason: &str,
) -> ToolResult {
    let target = task
        .allowed_paths
        .first()
        .cloned()
        .unwrap_or_else(|| "MOCK_NOTES.md".to_string());
    let diff = format!(
        "--- a/{target}\n+++ b/{target}\n@@ -0,0 +1,2 @@\n+mock change for task {}\n+{}\n",
        task.task_id,
        task.instruction.lines().next().unwrap_or(""),
    );

    let mut result = ToolResult::empty(tool, run_id, provider);
    result.status = ToolStatus::Success;
    result.output_kind = OutputKind::Diff;
    result.line_count = diff.lines().count() as u64;
    result.files_touched = vec![target];
    result.diff = diff;
    result.mock_used = true;
    result.mock_reason = Some(reason.to_string());
    result
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
