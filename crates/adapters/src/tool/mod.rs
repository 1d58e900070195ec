// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool adapter contract.
//!
//! Every external LLM or coding tool — cloud API, local CLI, or anything
//! reachable through MCP — implements [`ToolAdapter`]. The power boundary
//! is non-negotiable: tools produce diffs; they never write the working
//! tree and never commit. [`ToolRuntime`] enforces that boundary and
//! finalises audit evidence on every call.

mod cli;
mod diff;
mod http;
mod mock;
mod runtime;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use cli::CliToolAdapter;
pub use diff::{parse_unified_diff, DiffStats, DiffValidation};
pub use http::CloudChatAdapter;
pub use mock::mock_result;
pub use runtime::{
    gate_mode_enabled, normalize_endpoint, NullAuditSink, ToolAuditSink, ToolRuntime,
    GATE_MODE_ENV,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Errors from adapter plumbing. Tool-level failures are represented in
/// [`ToolResult::status`], not as errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter not registered: {0}")]
    NotRegistered(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Six-state health model for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Connected,
    NotConfigured,
    InvalidToken,
    Unreachable,
    ModelMissing,
    SchemaMismatch,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Connected)
    }
}

/// Mandatory failure classification, auditable end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Config,
    Auth,
    Network,
    Model,
    Schema,
    Runtime,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Network => "network",
            ErrorCategory::Model => "model",
            ErrorCategory::Schema => "schema",
            ErrorCategory::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolHealth {
    pub status: HealthState,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl ToolHealth {
    pub fn connected(details: impl Into<String>) -> Self {
        Self {
            status: HealthState::Connected,
            details: details.into(),
            error_category: None,
        }
    }

    pub fn failed(status: HealthState, details: impl Into<String>) -> Self {
        let mut health = Self {
            status,
            details: details.into(),
            error_category: None,
        };
        health.error_category = Some(health.categorize());
        health
    }

    /// Derive the category from the health status when unset.
    pub fn categorize(&self) -> ErrorCategory {
        if let Some(category) = self.error_category {
            return category;
        }
        match self.status {
            HealthState::NotConfigured => ErrorCategory::Config,
            HealthState::InvalidToken => ErrorCategory::Auth,
            HealthState::Unreachable => ErrorCategory::Network,
            HealthState::ModelMissing => ErrorCategory::Model,
            HealthState::SchemaMismatch => ErrorCategory::Schema,
            HealthState::Connected => ErrorCategory::Runtime,
        }
    }
}

/// The task handed to an adapter: the minimum a tool needs to produce a
/// diff against a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTask {
    pub task_id: String,
    pub instruction: String,
    pub repo_path: PathBuf,
    /// Paths the produced diff may touch. Empty = no restriction.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,
    /// What the caller expects back.
    #[serde(default)]
    pub expected_output: OutputKind,
}

fn default_timeout_secs() -> u64 {
    300
}

impl ToolTask {
    pub fn new(task_id: impl Into<String>, instruction: impl Into<String>, repo_path: PathBuf) -> Self {
        Self {
            task_id: task_id.into(),
            instruction: instruction.into(),
            repo_path,
            allowed_paths: Vec::new(),
            forbidden_paths: Vec::new(),
            timeout_seconds: default_timeout_secs(),
            expected_output: OutputKind::Diff,
        }
    }

    /// Stable fingerprint of this call for the tool ledger.
    pub fn fingerprint(&self, tool: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(tool.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.task_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.instruction.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.repo_path.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Execution status of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    PartialSuccess,
    Failed,
    Timeout,
}

impl ToolStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ToolStatus::Failed | ToolStatus::Timeout)
    }
}

/// Semantic type of a tool's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    #[default]
    Diff,
    Plan,
    Analysis,
    Explanation,
    Diagnosis,
}

/// Where a tool executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Cloud,
    Local,
}

/// Diff generation quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiffQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Declared capability set, consumed by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCapabilities {
    pub execution_mode: Provider,
    pub supports_diff: bool,
    pub supports_patch: bool,
    pub supports_health_check: bool,
    #[serde(default)]
    pub chat: bool,
    #[serde(default)]
    pub json_mode: bool,
    #[serde(default)]
    pub function_call: bool,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub long_context: bool,
    #[serde(default)]
    pub diff_quality: DiffQuality,
}

/// What one tool call produced.
///
/// `wrote_files` and `committed` are declarations of the power boundary:
/// they must always be false, and the runtime fails any result that says
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub status: ToolStatus,
    pub diff: String,
    #[serde(default)]
    pub files_touched: Vec<String>,
    #[serde(default)]
    pub line_count: u64,
    pub tool_run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub provider: Provider,
    #[serde(default)]
    pub output_kind: OutputKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    /// Normalised `scheme://host[:port]`, no path or query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_validation: Option<DiffValidation>,
    #[serde(default, rename = "_mock_used", skip_serializing_if = "std::ops::Not::not")]
    pub mock_used: bool,
    #[serde(default, rename = "_mock_reason", skip_serializing_if = "Option::is_none")]
    pub mock_reason: Option<String>,
    #[serde(default)]
    pub wrote_files: bool,
    #[serde(default)]
    pub committed: bool,
}

impl ToolResult {
    /// A result skeleton with the boundary declarations set correctly.
    pub fn empty(tool: &str, run_id: &str, provider: Provider) -> Self {
        Self {
            tool: tool.to_string(),
            status: ToolStatus::Failed,
            diff: String::new(),
            files_touched: Vec::new(),
            line_count: 0,
            tool_run_id: run_id.to_string(),
            model_id: None,
            provider,
            output_kind: OutputKind::Diff,
            error_category: None,
            endpoint: None,
            stdout: None,
            stderr: None,
            error_message: None,
            diff_validation: None,
            mock_used: false,
            mock_reason: None,
            wrote_files: false,
            committed: false,
        }
    }
}

/// Adapter for one external tool.
#[async_trait]
pub trait ToolAdapter: Send + Sync + 'static {
    /// Stable tool name, the registry key.
    fn name(&self) -> &str;

    /// Probe configuration, credentials, and reachability.
    async fn health_check(&self) -> ToolHealth;

    /// Execute the task. Tool-level failures are encoded in the result;
    /// `Err` is for plumbing failures only.
    ///
    /// `allow_mock` is only honoured when the process-wide gate mode is
    /// also enabled — see [`ToolRuntime`].
    async fn run(&self, task: &ToolTask, allow_mock: bool) -> Result<ToolResult, AdapterError>;

    fn supports(&self) -> ToolCapabilities;
}

/// Registry of adapters by tool name.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn ToolAdapter>>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn ToolAdapter>) {
        let name = adapter.name().to_string();
        tracing::debug!(tool = %name, "adapter registered");
        self.adapters.write().insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn ToolAdapter>, AdapterError> {
        self.adapters
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::NotRegistered(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
