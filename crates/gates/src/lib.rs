// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Governance gates for Foreman: redline validators for declarative specs,
//! the pause gate, and the DONE-gate runner.

mod done;
mod pause;
mod redline;
mod spec;

pub use done::{DoneGateRunner, GateError, GateResult, GateRunResult, GateStatus};
pub use pause::{can_pause_at, enforce_pause_checkpoint, PauseGateViolation};
pub use redline::{
    validate_command, validate_role, validate_rule, RedlineViolation, Redlines,
};
pub use spec::{CommandSpec, EffectDecl, RoleSpec, RuleSpec, SpecParseError};
