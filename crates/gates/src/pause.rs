// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The pause gate.
//!
//! RED LINE: a task may only pause at the `open_plan` checkpoint, and only
//! in interactive or assisted mode. Autonomous tasks never pause — a
//! runner that reaches the pause point in autonomous mode must mark the
//! task blocked instead.

use fm_core::{PauseCheckpoint, RunMode};
use thiserror::Error;

/// Raised when a pause is attempted at an illegal checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pause checkpoint '{checkpoint}' is not allowed; only 'open_plan' is permitted")]
pub struct PauseGateViolation {
    pub checkpoint: String,
}

/// Enforce that `checkpoint` names a legal pause point.
pub fn enforce_pause_checkpoint(checkpoint: &str) -> Result<PauseCheckpoint, PauseGateViolation> {
    match checkpoint {
        "open_plan" => Ok(PauseCheckpoint::OpenPlan),
        other => Err(PauseGateViolation {
            checkpoint: other.to_string(),
        }),
    }
}

/// Whether a task in `run_mode` may pause at `checkpoint`.
///
/// Errors on an illegal checkpoint; returns `Ok(false)` for autonomous
/// mode, which never pauses anywhere.
pub fn can_pause_at(checkpoint: &str, run_mode: RunMode) -> Result<bool, PauseGateViolation> {
    let checkpoint = enforce_pause_checkpoint(checkpoint)?;
    Ok(match run_mode {
        RunMode::Interactive => true,
        RunMode::Assisted => checkpoint == PauseCheckpoint::OpenPlan,
        RunMode::Autonomous => false,
    })
}

#[cfg(test)]
#[path = "pause_tests.rs"]
mod tests;
