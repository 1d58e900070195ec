// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redline validators: non-negotiable invariants checked before a role,
//! command, or rule spec is registered.
//!
//! A validator collects every violation it finds and fails registration if
//! any exist. Violations carry stable rule ids (`R-*`, `C-*`, `RL-*`) so
//! policies and audits can reference them.

use crate::spec::{CommandSpec, RoleSpec, RuleSpec};
use thiserror::Error;

/// A failed redline check. Never recovered locally; registration aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("redline {rule_id}: {message}")]
pub struct RedlineViolation {
    pub rule_id: String,
    pub message: String,
}

impl RedlineViolation {
    fn new(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            message: message.into(),
        }
    }
}

/// Field names whose presence on a role means it can execute something.
const ROLE_EXECUTABLE_FIELDS: &[&str] = &[
    "execute",
    "run",
    "apply",
    "command",
    "commands",
    "script",
    "tools",
    "executor",
];

/// Interaction kinds a role may not declare.
const ROLE_FORBIDDEN_INTERACTIONS: &[&str] = &["approve", "override", "manual_action", "execute"];

/// Command fields that would smuggle in an executable payload.
const COMMAND_PAYLOAD_FIELDS: &[&str] = &["run", "script", "shell", "payload", "exec"];

/// Validate a role spec against the role red lines.
///
/// A role must reference at least one real-world job title, declare exactly
/// one organisational category, restrict itself to question-style
/// interactions, and carry no executable fields.
pub fn validate_role(spec: &RoleSpec) -> Result<(), Vec<RedlineViolation>> {
    let mut violations = Vec::new();

    for field in ROLE_EXECUTABLE_FIELDS {
        if spec.extra.contains_key(*field) {
            violations.push(RedlineViolation::new(
                "R-001",
                format!("role '{}' must not carry executable field '{field}'", spec.id),
            ));
        }
    }

    if spec.category.trim().is_empty() || spec.category.contains(',') {
        violations.push(RedlineViolation::new(
            "R-002",
            format!(
                "role '{}' must declare exactly one organisational category, got '{}'",
                spec.id, spec.category
            ),
        ));
    }

    if spec.real_world_titles.is_empty() {
        violations.push(RedlineViolation::new(
            "R-003",
            format!("role '{}' must reference at least one real-world job title", spec.id),
        ));
    }

    for interaction in &spec.interactions {
        if ROLE_FORBIDDEN_INTERACTIONS.contains(&interaction.as_str()) {
            violations.push(RedlineViolation::new(
                "R-004",
                format!("role '{}' must not declare interaction '{interaction}'", spec.id),
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Validate a command spec against the command red lines.
///
/// A command must declare its side effects and risk, require a decision on
/// evidence, carry no executable payload, and never bind a role.
pub fn validate_command(spec: &CommandSpec) -> Result<(), Vec<RedlineViolation>> {
    let mut violations = Vec::new();

    for field in COMMAND_PAYLOAD_FIELDS {
        if spec.extra.contains_key(*field) {
            violations.push(RedlineViolation::new(
                "C-001",
                format!(
                    "command '{}' must not carry executable payload field '{field}'",
                    spec.id
                ),
            ));
        }
    }

    if spec.extra.contains_key("role") || spec.extra.contains_key("agent_binding") {
        violations.push(RedlineViolation::new(
            "C-002",
            format!("command '{}' must not bind a role", spec.id),
        ));
    }

    if spec.effects.is_empty() {
        violations.push(RedlineViolation::new(
            "C-003",
            format!("command '{}' must declare at least one side effect", spec.id),
        ));
    }

    match spec.risk_level.as_deref() {
        Some("low") | Some("medium") | Some("high") => {}
        Some(other) => violations.push(RedlineViolation::new(
            "C-003",
            format!(
                "command '{}' risk_level must be low, medium, or high, got '{other}'",
                spec.id
            ),
        )),
        None => violations.push(RedlineViolation::new(
            "C-003",
            format!("command '{}' must declare risk_level", spec.id),
        )),
    }

    if spec.evidence_required.is_none() {
        violations.push(RedlineViolation::new(
            "C-003",
            format!("command '{}' must declare evidence_required", spec.id),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Validate a rule spec against the rule red lines.
///
/// A rule must be machine-judgable (structured `when`/`then` tables with a
/// decision), declare its scope, and require evidence.
pub fn validate_rule(spec: &RuleSpec) -> Result<(), Vec<RedlineViolation>> {
    let mut violations = Vec::new();

    match &spec.when {
        Some(toml::Value::Table(table)) if !table.is_empty() => {}
        Some(toml::Value::Table(_)) => violations.push(RedlineViolation::new(
            "RL-003",
            format!("rule '{}' when-condition must not be empty", spec.id),
        )),
        Some(_) => violations.push(RedlineViolation::new(
            "RL-003",
            format!("rule '{}' when-condition must be a structured table", spec.id),
        )),
        None => violations.push(RedlineViolation::new(
            "RL-003",
            format!("rule '{}' must declare a when-condition", spec.id),
        )),
    }

    match &spec.then {
        Some(toml::Value::Table(table)) => {
            if !table.contains_key("decision") {
                violations.push(RedlineViolation::new(
                    "RL-003",
                    format!("rule '{}' then-decision must carry a 'decision' key", spec.id),
                ));
            }
        }
        Some(_) => violations.push(RedlineViolation::new(
            "RL-003",
            format!("rule '{}' then-decision must be a structured table", spec.id),
        )),
        None => violations.push(RedlineViolation::new(
            "RL-003",
            format!("rule '{}' must declare a then-decision", spec.id),
        )),
    }

    match spec.scope.as_deref() {
        Some(scope) if !scope.trim().is_empty() => {}
        _ => violations.push(RedlineViolation::new(
            "RL-004",
            format!("rule '{}' must declare an explicit scope", spec.id),
        )),
    }

    if spec.evidence_required.is_empty() {
        violations.push(RedlineViolation::new(
            "RL-002",
            format!("rule '{}' must require at least one evidence kind", spec.id),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Convenience runner over whatever specs a task attached.
#[derive(Debug, Default)]
pub struct Redlines;

impl Redlines {
    /// Validate every attached spec document, returning all violations.
    pub fn check_attached(
        roles: &[RoleSpec],
        commands: &[CommandSpec],
        rules: &[RuleSpec],
    ) -> Vec<RedlineViolation> {
        let mut all = Vec::new();
        for role in roles {
            if let Err(violations) = validate_role(role) {
                all.extend(violations);
            }
        }
        for command in commands {
            if let Err(violations) = validate_command(command) {
                all.extend(violations);
            }
        }
        for rule in rules {
            if let Err(violations) = validate_rule(rule) {
                all.extend(violations);
            }
        }
        all
    }
}

#[cfg(test)]
#[path = "redline_tests.rs"]
mod tests;
