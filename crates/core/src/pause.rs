// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pause state carried in task metadata.
//!
//! The enforcement rules (which checkpoints are legal, which run modes may
//! pause) live in fm-gates; these are just the persisted shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Current pause status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PauseState {
    #[default]
    None,
    AwaitingApproval,
}

/// A named point at which a task may legally be suspended.
///
/// Only `open_plan` exists in v1; the variant list is the closed set the
/// pause gate enforces against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseCheckpoint {
    OpenPlan,
}

impl PauseCheckpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            PauseCheckpoint::OpenPlan => "open_plan",
        }
    }
}

impl fmt::Display for PauseCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pause bookkeeping stored in `task.metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PauseMetadata {
    #[serde(default)]
    pub state: PauseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<PauseCheckpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PauseMetadata {
    /// Metadata for a task paused at `checkpoint`.
    pub fn awaiting(checkpoint: PauseCheckpoint, reason: impl Into<String>) -> Self {
        Self {
            state: PauseState::AwaitingApproval,
            checkpoint: Some(checkpoint),
            reason: Some(reason.into()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state == PauseState::AwaitingApproval
    }
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
