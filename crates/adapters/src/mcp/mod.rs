// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP (Model Context Protocol) support: JSON-RPC 2.0 over a child
//! process's stdio, one JSON object per line.

mod client;
mod config;
mod health;

pub use client::{McpClient, ToolDescriptor};
pub use config::{McpConfigError, McpServerConfig, McpServersFile, McpTransport};
pub use health::{McpHealthMonitor, McpHealthReport, McpHealthStatus};

use thiserror::Error;

/// MCP client error taxonomy.
#[derive(Debug, Error)]
pub enum McpError {
    /// Connection-level failure: spawn failed, process died, handshake
    /// broken.
    #[error("mcp connection error: {0}")]
    Connection(String),
    /// A request exceeded its deadline. The connection stays usable.
    #[error("mcp request timed out after {0}ms")]
    Timeout(u64),
    /// The server answered with a JSON-RPC error or a malformed payload.
    /// Fatal for the request, not the connection.
    #[error("mcp protocol error {code}: {message}")]
    Protocol { code: i64, message: String },
    /// Anything else.
    #[error("mcp client error: {0}")]
    Client(String),
}
