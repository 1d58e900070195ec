// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use thiserror::Error;

/// Errors that can occur in the engine.
///
/// Anything that escapes to the runner's task boundary is converted into a
/// terminal status with a precise exit reason.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] fm_storage::StoreError),
    #[error("gate error: {0}")]
    Gate(#[from] fm_gates::GateError),
    #[error("adapter error: {0}")]
    Adapter(#[from] fm_adapters::AdapterError),
    #[error("mcp error: {0}")]
    Mcp(#[from] fm_adapters::McpError),
    #[error("pause gate violation: {0}")]
    PauseGate(#[from] fm_gates::PauseGateViolation),
    #[error("pipeline error: {0}")]
    Pipeline(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
