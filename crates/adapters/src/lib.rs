// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Tool and MCP adapters for Foreman.
//!
//! The `tool` module is the unified contract every external model or tool
//! process implements — health, diff-only results, capability declaration —
//! plus the runtime wrapper that enforces the red lines. The `mcp` module
//! speaks JSON-RPC 2.0 to MCP servers over child-process stdio.

pub mod mcp;
pub mod tool;

pub use mcp::{
    McpClient, McpError, McpHealthMonitor, McpHealthReport, McpHealthStatus, McpServerConfig,
    McpServersFile, ToolDescriptor,
};
pub use tool::{
    normalize_endpoint, AdapterError, AdapterRegistry, DiffQuality, DiffValidation, ErrorCategory,
    HealthState, OutputKind, Provider, ToolAdapter, ToolAuditSink, ToolCapabilities, ToolHealth,
    ToolResult, ToolRuntime, ToolStatus, ToolTask,
};

#[cfg(any(test, feature = "test-support"))]
pub use tool::fake::{FakeCall, FakeToolAdapter};
