// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    interactive = { RunMode::Interactive, true },
    assisted = { RunMode::Assisted, true },
    autonomous = { RunMode::Autonomous, false },
)]
fn open_plan_pause_by_mode(mode: RunMode, expected: bool) {
    assert_eq!(can_pause_at("open_plan", mode).unwrap(), expected);
}

#[parameterized(
    plan_review = { "plan_review" },
    pre_commit = { "pre_commit" },
    empty = { "" },
    close_plan = { "close_plan" },
)]
fn illegal_checkpoints_raise(checkpoint: &str) {
    let err = can_pause_at(checkpoint, RunMode::Interactive).unwrap_err();
    assert_eq!(err.checkpoint, checkpoint);

    // The enforcement helper rejects the same set.
    assert!(enforce_pause_checkpoint(checkpoint).is_err());
}

#[test]
fn enforce_accepts_open_plan() {
    assert_eq!(
        enforce_pause_checkpoint("open_plan").unwrap(),
        PauseCheckpoint::OpenPlan
    );
}

#[test]
fn violation_message_names_the_checkpoint() {
    let err = enforce_pause_checkpoint("pre_merge").unwrap_err();
    assert!(err.to_string().contains("pre_merge"));
    assert!(err.to_string().contains("open_plan"));
}
