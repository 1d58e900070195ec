// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn role_spec_parses_with_extras_preserved() {
    let spec = RoleSpec::parse(
        r#"
        id = "backend_reviewer"
        title = "Backend Reviewer"
        category = "engineering"
        real_world_titles = ["Staff Engineer"]
        interactions = ["question"]
        execute = "anything"
        "#,
    )
    .unwrap();
    assert_eq!(spec.id, "backend_reviewer");
    assert!(spec.extra.contains_key("execute"));
}

#[test]
fn command_spec_parses_effects_table() {
    let spec = CommandSpec::parse(
        r#"
        id = "refactor_module"
        description = "Refactor one module"
        risk_level = "medium"
        evidence_required = true

        [[effects]]
        target = "repo"
        action = "modify"
        "#,
    )
    .unwrap();
    assert_eq!(spec.effects.len(), 1);
    assert_eq!(spec.effects[0].target, "repo");
    assert_eq!(spec.risk_level.as_deref(), Some("medium"));
}

#[test]
fn rule_spec_parses_structured_when_then() {
    let spec = RuleSpec::parse(
        r#"
        id = "block_high_risk"
        scope = "task"
        evidence_required = ["risk_matrix"]

        [when]
        risk_level = "high"

        [then]
        decision = "BLOCK"
        "#,
    )
    .unwrap();
    assert!(matches!(spec.when, Some(toml::Value::Table(_))));
    assert!(matches!(spec.then, Some(toml::Value::Table(_))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = RoleSpec::parse("id = ").unwrap_err();
    assert!(matches!(err, SpecParseError::Toml(_)));
}
