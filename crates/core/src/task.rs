// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identity, status machine, and typed metadata.
//!
//! A task is one unit of orchestrated work, driven by the runner through a
//! fixed state machine:
//!
//! ```text
//! created ─► intent_processing ─► planning ─► {awaiting_approval | executing}
//! awaiting_approval ─► executing (on approval)
//! executing ─► verifying
//! verifying ─► succeeded | planning (gate failure, re-plan)
//! any ─► failed | canceled | blocked (terminal)
//! ```
//!
//! Nothing outside these edges is a legal transition. Once a task reaches a
//! terminal status its row is never mutated again, except to backfill
//! `exit_reason`.

use crate::pause::PauseMetadata;
use crate::route::RoutePlan;
use crate::work_item::WorkItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a task.
    #[derive(Default)]
    pub struct TaskId;
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    IntentProcessing,
    Planning,
    AwaitingApproval,
    Executing,
    Verifying,
    Succeeded,
    Failed,
    Canceled,
    Blocked,
}

impl TaskStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Canceled | TaskStatus::Blocked
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// The terminal statuses failed/canceled/blocked are reachable from any
    /// non-terminal status; everything else must follow the enumerated edges.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(
            next,
            TaskStatus::Failed | TaskStatus::Canceled | TaskStatus::Blocked
        ) {
            return true;
        }
        matches!(
            (self, next),
            (TaskStatus::Created, TaskStatus::IntentProcessing)
                | (TaskStatus::IntentProcessing, TaskStatus::Planning)
                | (TaskStatus::Planning, TaskStatus::AwaitingApproval)
                | (TaskStatus::Planning, TaskStatus::Executing)
                | (TaskStatus::AwaitingApproval, TaskStatus::Executing)
                | (TaskStatus::Executing, TaskStatus::Verifying)
                | (TaskStatus::Verifying, TaskStatus::Succeeded)
                | (TaskStatus::Verifying, TaskStatus::Planning)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::IntentProcessing => "intent_processing",
            TaskStatus::Planning => "planning",
            TaskStatus::AwaitingApproval => "awaiting_approval",
            TaskStatus::Executing => "executing",
            TaskStatus::Verifying => "verifying",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much autonomy the runner has for this task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Interactive,
    #[default]
    Assisted,
    Autonomous,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Interactive => "interactive",
            RunMode::Assisted => "assisted",
            RunMode::Autonomous => "autonomous",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the runner stopped driving a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Done,
    Blocked,
    UserCancelled,
    Timeout,
    FatalError,
    MaxIterations,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Done => "done",
            ExitReason::Blocked => "blocked",
            ExitReason::UserCancelled => "user_cancelled",
            ExitReason::Timeout => "timeout",
            ExitReason::FatalError => "fatal_error",
            ExitReason::MaxIterations => "max_iterations",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-task timeout configuration.
///
/// The warning limit produces an audit warning; the hard limit fails the
/// task with `exit_reason = timeout`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub warning_ms: u64,
    pub hard_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            warning_ms: 10 * 60 * 1000,
            hard_ms: 30 * 60 * 1000,
        }
    }
}

/// Runtime timeout bookkeeping updated once per runner iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutState {
    /// Epoch ms at which the runner started driving the task.
    pub started_at_ms: u64,
    /// Epoch ms of the last heartbeat.
    pub heartbeat_at_ms: u64,
    /// Whether the warning-level audit line has already been written.
    pub warned: bool,
}

/// Context carried from a failed DONE gate back into planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateFailureContext {
    pub gate_name: String,
    pub exit_code: i32,
    pub summary: String,
    /// Which verification attempt produced this failure (1-based).
    pub attempt: u32,
}

/// Typed task metadata.
///
/// The original system kept an open-ended dict here; each consumer now gets
/// a typed field, and `ext` remains for forward-compatible extras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    #[serde(default)]
    pub pause: PauseMetadata,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub timeout_state: TimeoutState,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// DONE gates to run in the verifying state.
    #[serde(default = "default_gates")]
    pub gates: Vec<String>,
    /// Work items extracted from the plan, in execution order.
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_plan: Option<RoutePlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_failure_context: Option<GateFailureContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Cooperative cancel flag, checked once per runner iteration.
    #[serde(default)]
    pub cancel_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nl_request: Option<String>,
    /// Free-form extension map for forward-compat.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub ext: HashMap<String, serde_json::Value>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_gates() -> Vec<String> {
    vec!["doctor".to_string()]
}

impl Default for TaskMetadata {
    fn default() -> Self {
        Self {
            pause: PauseMetadata::default(),
            timeout: TimeoutConfig::default(),
            timeout_state: TimeoutState::default(),
            retry_count: 0,
            max_retries: default_max_retries(),
            gates: default_gates(),
            work_items: Vec::new(),
            route_plan: None,
            gate_failure_context: None,
            project_id: None,
            cancel_requested: false,
            nl_request: None,
            ext: HashMap::new(),
        }
    }
}

/// One unit of orchestrated work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub run_mode: RunMode,
    #[serde(default)]
    pub metadata: TaskMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Task {
    /// Create a freshly-registered task.
    pub fn new(id: TaskId, title: impl Into<String>, run_mode: RunMode, now_ms: u64) -> Self {
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Created,
            run_mode,
            metadata: TaskMetadata::default(),
            exit_reason: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Derive the exit reason a terminal status implies when none was set
    /// explicitly by the runner.
    pub fn implied_exit_reason(&self) -> Option<ExitReason> {
        match self.status {
            TaskStatus::Succeeded => Some(ExitReason::Done),
            TaskStatus::Blocked => Some(ExitReason::Blocked),
            TaskStatus::Canceled => Some(ExitReason::UserCancelled),
            TaskStatus::Failed => Some(ExitReason::FatalError),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
