// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn artifact(path: &str) -> Evidence {
    Evidence::ArtifactExists {
        path: path.to_string(),
        artifact_type: "json".to_string(),
    }
}

#[test]
fn require_all_pack_needs_every_item() {
    let pack = EvidencePack::require_all(vec![artifact("a.json"), artifact("b.json")]);
    assert!(pack.is_satisfied(&[EvidenceVerdict::Verified, EvidenceVerdict::Verified]));
    assert!(!pack.is_satisfied(&[EvidenceVerdict::Verified, EvidenceVerdict::Failed]));
    assert!(!pack.is_satisfied(&[EvidenceVerdict::Verified]));
}

#[test]
fn at_least_pack_uses_min_verified() {
    let pack = EvidencePack::at_least(
        vec![artifact("a"), artifact("b"), artifact("c")],
        2,
    );
    assert!(pack.is_satisfied(&[
        EvidenceVerdict::Verified,
        EvidenceVerdict::Failed,
        EvidenceVerdict::Verified,
    ]));
    assert!(!pack.is_satisfied(&[
        EvidenceVerdict::Verified,
        EvidenceVerdict::Failed,
        EvidenceVerdict::Failed,
    ]));
}

#[test]
fn empty_pack_is_trivially_satisfied() {
    let pack = EvidencePack::default();
    assert!(pack.is_satisfied(&[]));
}

#[test]
fn evidence_serde_uses_kind_tag() {
    let evidence = Evidence::CommandExit {
        command: "cargo test".to_string(),
        exit_code: 0,
    };
    let json = serde_json::to_value(&evidence).unwrap();
    assert_eq!(json["kind"], "command_exit");
    let parsed: Evidence = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, evidence);
    assert_eq!(evidence.kind_name(), "command_exit");
}
