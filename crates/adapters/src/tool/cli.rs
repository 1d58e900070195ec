// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local CLI adapter.
//!
//! Drives a coding CLI (claude-style) in non-interactive print mode, then
//! captures the working-tree diff with `git diff`. The CLI itself edits a
//! scratch checkout; the adapter only ever reports the diff.

use crate::tool::mock::mock_result;
use crate::tool::{
    AdapterError, DiffQuality, HealthState, Provider, ToolAdapter, ToolCapabilities, ToolHealth,
    ToolResult, ToolStatus, ToolTask,
};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Adapter for a local coding CLI.
pub struct CliToolAdapter {
    tool_name: String,
    binary: String,
    print_flag: String,
}

impl CliToolAdapter {
    pub fn new(tool_name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            binary: binary.into(),
            print_flag: "--print".to_string(),
        }
    }

    /// Override the non-interactive flag for CLIs that spell it otherwise.
    pub fn with_print_flag(mut self, flag: impl Into<String>) -> Self {
        self.print_flag = flag.into();
        self
    }

    async fn git_diff(&self, task: &ToolTask) -> Result<String, AdapterError> {
        let output = tokio::time::timeout(
            Duration::from_secs(10),
            Command::new("git")
                .arg("diff")
                .current_dir(&task.repo_path)
                .stdin(Stdio::null())
                .output(),
        )
        .await
        .map_err(|_| {
            AdapterError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "git diff timed out",
            ))
        })??;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ToolAdapter for CliToolAdapter {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn health_check(&self) -> ToolHealth {
        let probe = tokio::time::timeout(
            Duration::from_secs(5),
            Command::new(&self.binary)
                .arg("--version")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output(),
        )
        .await;
        match probe {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                ToolHealth::connected(format!("{} available: {version}", self.binary))
            }
            Ok(Ok(output)) => ToolHealth::failed(
                HealthState::InvalidToken,
                format!(
                    "{} --version exited {}",
                    self.binary,
                    output.status.code().unwrap_or(-1)
                ),
            ),
            Ok(Err(_)) => ToolHealth::failed(
                HealthState::NotConfigured,
                format!("{} not found on PATH", self.binary),
            ),
            Err(_) => ToolHealth::failed(
                HealthState::Unreachable,
                format!("{} --version timed out", self.binary),
            ),
        }
    }

    async fn run(&self, task: &ToolTask, allow_mock: bool) -> Result<ToolResult, AdapterError> {
        let run_id = uuid::Uuid::new_v4().to_string();

        let spawned = tokio::time::timeout(
            Duration::from_secs(task.timeout_seconds),
            Command::new(&self.binary)
                .arg(&self.print_flag)
                .arg(&task.instruction)
                .current_dir(&task.repo_path)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match spawned {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                // Binary missing or unspawnable.
                if allow_mock {
                    return Ok(mock_result(
                        &self.tool_name,
                        task,
                        &run_id,
                        Provider::Local,
                        &format!("spawn failed: {e}"),
                    ));
                }
                let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Local);
                result.error_message = Some(format!("failed to spawn {}: {e}", self.binary));
                result.error_category = Some(crate::tool::ErrorCategory::Config);
                return Ok(result);
            }
            Err(_) => {
                // Timeout in production is a hard failure; the mock escape
                // hatch only opens in gate mode.
                if allow_mock {
                    return Ok(mock_result(
                        &self.tool_name,
                        task,
                        &run_id,
                        Provider::Local,
                        "timeout",
                    ));
                }
                let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Local);
                result.status = ToolStatus::Timeout;
                result.error_message = Some(format!(
                    "{} timed out after {}s",
                    self.binary, task.timeout_seconds
                ));
                return Ok(result);
            }
        };

        let diff = self.git_diff(task).await?;
        let exit_ok = output.status.success();
        let status = match (exit_ok, diff.trim().is_empty()) {
            (true, false) => ToolStatus::Success,
            (true, true) => ToolStatus::PartialSuccess,
            (false, _) => ToolStatus::Failed,
        };

        let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Local);
        result.status = status;
        result.line_count = diff.lines().count() as u64;
        result.diff = diff;
        result.output_kind = task.expected_output;
        result.stdout = Some(String::from_utf8_lossy(&output.stdout).into_owned());
        result.stderr = Some(String::from_utf8_lossy(&output.stderr).into_owned());
        if status == ToolStatus::Failed {
            result.error_message = Some(format!(
                "{} exited {}",
                self.binary,
                output.status.code().unwrap_or(-1)
            ));
        }
        Ok(result)
    }

    fn supports(&self) -> ToolCapabilities {
        ToolCapabilities {
            execution_mode: Provider::Local,
            supports_diff: true,
            supports_patch: true,
            supports_health_check: true,
            chat: true,
            json_mode: false,
            function_call: false,
            stream: false,
            long_context: true,
            diff_quality: DiffQuality::High,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
