// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_is_not_paused() {
    let meta = PauseMetadata::default();
    assert_eq!(meta.state, PauseState::None);
    assert!(!meta.is_paused());
    assert!(meta.checkpoint.is_none());
}

#[test]
fn awaiting_sets_checkpoint_and_reason() {
    let meta = PauseMetadata::awaiting(PauseCheckpoint::OpenPlan, "plan ready for review");
    assert!(meta.is_paused());
    assert_eq!(meta.checkpoint, Some(PauseCheckpoint::OpenPlan));
    assert_eq!(meta.reason.as_deref(), Some("plan ready for review"));
}

#[test]
fn checkpoint_wire_name() {
    assert_eq!(PauseCheckpoint::OpenPlan.to_string(), "open_plan");
    let json = serde_json::to_string(&PauseCheckpoint::OpenPlan).unwrap();
    assert_eq!(json, r#""open_plan""#);
}

#[test]
fn pause_metadata_serde_roundtrip() {
    let meta = PauseMetadata::awaiting(PauseCheckpoint::OpenPlan, "review");
    let json = serde_json::to_string(&meta).unwrap();
    let parsed: PauseMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, meta);
}
