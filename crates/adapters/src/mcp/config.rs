// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP server configuration: one YAML document with an `mcp_servers`
//! list, loaded from `~/.foreman/mcp_servers.yaml` by default.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating the config file.
#[derive(Debug, Error)]
pub enum McpConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("server '{id}' invalid: {message}")]
    Invalid { id: String, message: String },
    #[error("duplicate server id: {0}")]
    DuplicateId(String),
}

/// Supported transports. Only stdio is driven by the client today; the
/// rest are declared so configs can carry them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum McpTransport {
    #[default]
    Stdio,
    Tcp,
    Ssh,
    Https,
    Http,
}

impl fmt::Display for McpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            McpTransport::Stdio => "stdio",
            McpTransport::Tcp => "tcp",
            McpTransport::Ssh => "ssh",
            McpTransport::Https => "https",
            McpTransport::Http => "http",
        };
        f.write_str(s)
    }
}

/// Configuration for one MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub transport: McpTransport,
    pub command: Vec<String>,
    /// Tool allow-list; empty allows every tool.
    #[serde(default)]
    pub allow_tools: Vec<String>,
    #[serde(default)]
    pub deny_side_effect_tags: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl McpServerConfig {
    pub fn validate(&self) -> Result<(), McpConfigError> {
        if self.command.is_empty() {
            return Err(McpConfigError::Invalid {
                id: self.id.clone(),
                message: "command must be non-empty".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(McpConfigError::Invalid {
                id: self.id.clone(),
                message: "timeout_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Empty allow-list means every tool is allowed.
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        self.allow_tools.is_empty() || self.allow_tools.iter().any(|t| t == tool_name)
    }

    /// Whether any of the given side-effect tags is denied.
    pub fn is_side_effect_denied(&self, tags: &[String]) -> bool {
        tags.iter().any(|tag| self.deny_side_effect_tags.contains(tag))
    }
}

/// The whole config document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServersFile {
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,
}

impl McpServersFile {
    /// Default config path: `~/.foreman/mcp_servers.yaml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".foreman")
            .join("mcp_servers.yaml")
    }

    /// Load and validate the document. A missing file yields an empty
    /// server list, not an error.
    pub fn load(path: &Path) -> Result<Self, McpConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "mcp config not found, no servers available");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| McpConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, McpConfigError> {
        let file: McpServersFile = serde_yaml::from_str(raw)?;
        let mut seen = std::collections::HashSet::new();
        for server in &file.mcp_servers {
            server.validate()?;
            if !seen.insert(server.id.clone()) {
                return Err(McpConfigError::DuplicateId(server.id.clone()));
            }
        }
        Ok(file)
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.mcp_servers.iter().filter(|s| s.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&McpServerConfig> {
        self.mcp_servers.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
