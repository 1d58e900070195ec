// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Verifiable evidence backing checkpoints and work-item outputs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single verifiable claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// A file exists at `path` with the declared artifact type.
    ArtifactExists {
        path: String,
        artifact_type: String,
    },
    /// A command was run and exited with `exit_code`.
    CommandExit { command: String, exit_code: i32 },
    /// A database row matching `where_clause` carries `values`.
    DbRow {
        table: String,
        where_clause: String,
        values: HashMap<String, serde_json::Value>,
    },
}

impl Evidence {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Evidence::ArtifactExists { .. } => "artifact_exists",
            Evidence::CommandExit { .. } => "command_exit",
            Evidence::DbRow { .. } => "db_row",
        }
    }
}

/// Outcome of verifying one evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceVerdict {
    Verified,
    Failed,
}

/// A set of evidence with a verification policy.
///
/// The pack is satisfied when either every item verifies (`require_all`)
/// or at least `min_verified` items do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    pub items: Vec<Evidence>,
    #[serde(default)]
    pub min_verified: usize,
    #[serde(default = "default_require_all")]
    pub require_all: bool,
}

fn default_require_all() -> bool {
    true
}

impl EvidencePack {
    pub fn require_all(items: Vec<Evidence>) -> Self {
        let min_verified = items.len();
        Self {
            items,
            min_verified,
            require_all: true,
        }
    }

    pub fn at_least(items: Vec<Evidence>, min_verified: usize) -> Self {
        Self {
            items,
            min_verified,
            require_all: false,
        }
    }

    /// Evaluate the policy over per-item verdicts.
    ///
    /// `verdicts` must be parallel to `items`; missing verdicts count as
    /// failures.
    pub fn is_satisfied(&self, verdicts: &[EvidenceVerdict]) -> bool {
        let verified = self
            .items
            .iter()
            .zip(verdicts.iter())
            .filter(|(_, v)| **v == EvidenceVerdict::Verified)
            .count();
        if self.require_all {
            verified == self.items.len()
        } else {
            verified >= self.min_verified
        }
    }
}

impl Default for EvidencePack {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            min_verified: 0,
            require_all: true,
        }
    }
}

#[cfg(test)]
#[path = "evidence_tests.rs"]
mod tests;
