// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DONE gate runner.
//!
//! After execution a task enters `verifying`, where its configured gates
//! run sequentially. The first failing gate stops the run; an all-pass
//! advances the task to `succeeded`, any failure sends it back to
//! `planning` with the failure context.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Grace period between SIGTERM and SIGKILL on a timed-out gate.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// Errors from gate execution plumbing (not gate failures).
#[derive(Debug, Error)]
pub enum GateError {
    #[error("unknown gate: {0}")]
    UnknownGate(String),
    #[error("gate command for '{0}' is empty")]
    EmptyCommand(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl GateStatus {
    pub fn passed(&self) -> bool {
        matches!(self, GateStatus::Passed)
    }
}

/// Captured result of one gate command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_name: String,
    pub status: GateStatus,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregated result of one verification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRunResult {
    pub task_id: String,
    pub gates_executed: Vec<GateResult>,
    pub overall_status: GateStatus,
    pub total_duration_seconds: f64,
    pub executed_at: String,
}

impl GateRunResult {
    pub fn all_passed(&self) -> bool {
        self.overall_status.passed() && self.gates_executed.iter().all(|g| g.status.passed())
    }

    /// The first failing gate, if any.
    pub fn first_failure(&self) -> Option<&GateResult> {
        self.gates_executed.iter().find(|g| !g.status.passed())
    }
}

/// Runs DONE gates sequentially with per-gate timeouts.
pub struct DoneGateRunner {
    working_dir: PathBuf,
    commands: HashMap<String, Vec<String>>,
    gate_timeout: Duration,
}

impl DoneGateRunner {
    /// Create a runner with the built-in gate commands.
    pub fn new(working_dir: PathBuf) -> Self {
        let mut commands = HashMap::new();
        commands.insert(
            "doctor".to_string(),
            vec!["sh".to_string(), "-c".to_string(), "echo doctor check passed".to_string()],
        );
        commands.insert(
            "smoke".to_string(),
            vec!["sh".to_string(), "-c".to_string(), "echo smoke test passed".to_string()],
        );
        commands.insert(
            "tests".to_string(),
            vec!["cargo".to_string(), "test".to_string(), "--quiet".to_string()],
        );
        Self {
            working_dir,
            commands,
            gate_timeout: Duration::from_secs(300),
        }
    }

    /// Register or replace a gate command.
    pub fn register_gate(&mut self, name: impl Into<String>, command: Vec<String>) {
        self.commands.insert(name.into(), command);
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    /// Run the named gates in order, stopping at the first failure.
    pub async fn run_gates(
        &self,
        task_id: &str,
        gate_names: &[String],
        executed_at: String,
    ) -> Result<GateRunResult, GateError> {
        let started = Instant::now();
        let mut executed = Vec::new();
        let mut overall = GateStatus::Passed;

        for name in gate_names {
            let result = self.run_one(name).await?;
            tracing::info!(
                task = task_id,
                gate = %name,
                status = ?result.status,
                exit_code = result.exit_code,
                duration_s = result.duration_seconds,
                "gate finished"
            );
            let failed = !result.status.passed();
            if failed {
                overall = result.status;
            }
            executed.push(result);
            if failed {
                break;
            }
        }

        Ok(GateRunResult {
            task_id: task_id.to_string(),
            gates_executed: executed,
            overall_status: overall,
            total_duration_seconds: started.elapsed().as_secs_f64(),
            executed_at,
        })
    }

    async fn run_one(&self, name: &str) -> Result<GateResult, GateError> {
        let command = self
            .commands
            .get(name)
            .ok_or_else(|| GateError::UnknownGate(name.to_string()))?;
        let (program, args) = command
            .split_first()
            .ok_or_else(|| GateError::EmptyCommand(name.to_string()))?;

        let started = Instant::now();
        let spawned = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return Ok(GateResult {
                    gate_name: name.to_string(),
                    status: GateStatus::Error,
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_seconds: started.elapsed().as_secs_f64(),
                    error_message: Some(format!("spawn failed: {e}")),
                });
            }
        };

        // Drain output concurrently so a chatty gate cannot deadlock on a
        // full pipe while we wait for exit.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let (status, timed_out) =
            match tokio::time::timeout(self.gate_timeout, child.wait()).await {
                Ok(waited) => (Some(waited?), false),
                Err(_) => {
                    self.terminate(&mut child, name).await;
                    (None, true)
                }
            };

        let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
        let duration_seconds = started.elapsed().as_secs_f64();

        if timed_out {
            return Ok(GateResult {
                gate_name: name.to_string(),
                status: GateStatus::Timeout,
                exit_code: -1,
                stdout,
                stderr,
                duration_seconds,
                error_message: Some(format!(
                    "gate timed out after {}s",
                    self.gate_timeout.as_secs()
                )),
            });
        }

        let exit_code = status.and_then(|s| s.code()).unwrap_or(-1);
        let status = if exit_code == 0 {
            GateStatus::Passed
        } else {
            GateStatus::Failed
        };
        Ok(GateResult {
            gate_name: name.to_string(),
            status,
            exit_code,
            stdout,
            stderr,
            duration_seconds,
            error_message: None,
        })
    }

    /// SIGTERM, bounded grace, then SIGKILL.
    async fn terminate(&self, child: &mut tokio::process::Child, gate: &str) {
        if let Some(pid) = child.id() {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!(gate, error = %e, "SIGTERM failed");
            }
            if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_ok() {
                return;
            }
            tracing::warn!(gate, "gate ignored SIGTERM, killing");
        }
        if let Err(e) = child.kill().await {
            tracing::warn!(gate, error = %e, "kill failed");
        }
    }
}

#[cfg(test)]
#[path = "done_tests.rs"]
mod tests;
