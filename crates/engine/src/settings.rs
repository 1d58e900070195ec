// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-level settings inheritance.
//!
//! Before execution the runner resolves effective settings for the task's
//! project: which tool runner to use and where to execute.

use fm_core::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Settings declared at the project level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Tool name to route execution through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

/// Project id → settings.
pub type ProjectSettingsMap = HashMap<String, ProjectSettings>;

/// What the runner actually uses after inheritance.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub runner: String,
    pub working_directory: PathBuf,
}

impl EffectiveSettings {
    /// Resolve settings for a task: project settings override the
    /// defaults; the task's route plan overrides the project runner.
    pub fn resolve(
        task: &Task,
        projects: &ProjectSettingsMap,
        default_runner: &str,
        default_dir: &PathBuf,
    ) -> Self {
        let project = task
            .metadata
            .project_id
            .as_ref()
            .and_then(|id| projects.get(id));

        let runner = task
            .metadata
            .route_plan
            .as_ref()
            .map(|plan| plan.primary.clone())
            .or_else(|| project.and_then(|p| p.runner.clone()))
            .unwrap_or_else(|| default_runner.to_string());

        let working_directory = project
            .and_then(|p| p.working_directory.clone())
            .unwrap_or_else(|| default_dir.clone());

        Self {
            runner,
            working_directory,
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
