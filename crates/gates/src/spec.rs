// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative spec documents (roles, commands, rules), parsed from TOML.
//!
//! These are the three registrable object kinds the redline validators
//! check before anything enters the system. Unknown keys are kept in the
//! `extra` maps so validators can reject fields that must not exist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from parsing a spec document.
#[derive(Debug, Error)]
pub enum SpecParseError {
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),
}

/// An organisational role definition.
///
/// Roles describe who asks questions of the system; they never execute
/// anything, which is exactly what the redline validator enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub id: String,
    pub title: String,
    /// Exactly one organisational category.
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Real-world job titles this role maps to.
    #[serde(default)]
    pub real_world_titles: Vec<String>,
    /// Interaction kinds the role may use.
    #[serde(default)]
    pub interactions: Vec<String>,
    /// Everything else in the document, preserved for validation.
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

/// One declared side effect of a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDecl {
    pub target: String,
    pub action: String,
}

/// A command definition: what can be requested, never how it executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Declared side effects; must be non-empty.
    #[serde(default)]
    pub effects: Vec<EffectDecl>,
    /// low | medium | high
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub evidence_required: Option<bool>,
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

/// A governance rule with a structured predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Structured condition; must be a non-empty table.
    #[serde(default)]
    pub when: Option<toml::Value>,
    /// Structured decision; must be a table with a `decision` key.
    #[serde(default)]
    pub then: Option<toml::Value>,
    /// Where the rule applies.
    #[serde(default)]
    pub scope: Option<String>,
    /// Evidence kinds the rule requires; must be non-empty.
    #[serde(default)]
    pub evidence_required: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, toml::Value>,
}

impl RoleSpec {
    pub fn parse(doc: &str) -> Result<Self, SpecParseError> {
        Ok(toml::from_str(doc)?)
    }
}

impl CommandSpec {
    pub fn parse(doc: &str) -> Result<Self, SpecParseError> {
        Ok(toml::from_str(doc)?)
    }
}

impl RuleSpec {
    pub fn parse(doc: &str) -> Result<Self, SpecParseError> {
        Ok(toml::from_str(doc)?)
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
