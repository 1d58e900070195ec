// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 client over a child process's stdio.
//!
//! Framing is one JSON object per line, UTF-8. A background reader task
//! routes responses to pending requests by id; notifications are logged.
//! Malformed lines are skipped, never fatal.

use crate::mcp::{McpError, McpServerConfig};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// MCP protocol revision sent during the handshake.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Handshake deadline, separate from per-request timeouts.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Grace period between SIGTERM and SIGKILL on disconnect.
const TERM_GRACE: Duration = Duration::from_secs(5);

/// A tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<Value>,
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Serialize)]
struct Notification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

type PendingMap = Mutex<HashMap<u64, oneshot::Sender<Result<Value, McpError>>>>;

struct Connection {
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
}

/// An MCP stdio client for one configured server.
pub struct McpClient {
    config: McpServerConfig,
    state: tokio::sync::Mutex<Option<Connection>>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            state: tokio::sync::Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    /// Spawn the server process and perform the MCP handshake.
    pub async fn connect(&self) -> Result<(), McpError> {
        {
            let state = self.state.lock().await;
            if state.is_some() {
                tracing::warn!(server = %self.config.id, "already connected");
                return Ok(());
            }
        }

        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| McpError::Connection("empty server command".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| McpError::Connection(format!("spawn failed: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Connection("missing child stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Connection("missing child stdout".to_string()))?;

        let reader = tokio::spawn(read_loop(
            self.config.id.clone(),
            stdout,
            Arc::clone(&self.pending),
        ));

        {
            let mut state = self.state.lock().await;
            *state = Some(Connection { child, stdin, reader });
        }

        // Handshake: initialize, then the initialized notification.
        let init = self
            .request_with_timeout(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "foreman",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                })),
                HANDSHAKE_TIMEOUT,
            )
            .await;

        match init {
            Ok(result) => {
                tracing::info!(
                    server = %self.config.id,
                    server_info = %result.get("serverInfo").cloned().unwrap_or(serde_json::Value::Null),
                    "mcp server initialized"
                );
            }
            Err(e) => {
                self.disconnect().await;
                return Err(McpError::Connection(format!("initialize failed: {e}")));
            }
        }

        if let Err(e) = self.notify("notifications/initialized", None).await {
            self.disconnect().await;
            return Err(McpError::Connection(format!(
                "initialized notification failed: {e}"
            )));
        }
        Ok(())
    }

    /// Terminate the connection: stop the reader, end the child process
    /// (gracefully, then by force), and fail all pending requests.
    pub async fn disconnect(&self) {
        let connection = { self.state.lock().await.take() };
        let Some(mut connection) = connection else {
            return;
        };
        connection.reader.abort();

        if let Some(pid) = connection.child.id() {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            if tokio::time::timeout(TERM_GRACE, connection.child.wait())
                .await
                .is_err()
            {
                tracing::warn!(server = %self.config.id, "server ignored SIGTERM, killing");
                let _ = connection.child.kill().await;
            }
        }

        fail_all_pending(&self.pending, || {
            McpError::Connection("client disconnected".to_string())
        });
        tracing::info!(server = %self.config.id, "disconnected");
    }

    /// Whether the server process is still running.
    pub async fn is_alive(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.as_mut() {
            Some(connection) => matches!(connection.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// `tools/list`, bounded by the per-server timeout.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result = self.request("tools/list", Some(serde_json::json!({}))).await?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| McpError::Protocol {
                code: 0,
                message: "tools/list result missing 'tools'".to_string(),
            })?;
        serde_json::from_value(tools).map_err(|e| McpError::Protocol {
            code: 0,
            message: format!("invalid tools/list payload: {e}"),
        })
    }

    /// `tools/call`, bounded by the per-server timeout.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.request(
            "tools/call",
            Some(serde_json::json!({"name": name, "arguments": arguments})),
        )
        .await
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        self.request_with_timeout(method, params, timeout).await
    }

    async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let line = serde_json::to_string(&request)
            .map_err(|e| McpError::Client(format!("serialize failed: {e}")))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if let Err(e) = self.write_line(&line).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }
        tracing::debug!(server = %self.config.id, method, id, "request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(McpError::Connection(
                "connection closed while awaiting response".to_string(),
            )),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(McpError::Timeout(timeout.as_millis() as u64))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = Notification {
            jsonrpc: "2.0",
            method,
            params,
        };
        let line = serde_json::to_string(&notification)
            .map_err(|e| McpError::Client(format!("serialize failed: {e}")))?;
        self.write_line(&line).await
    }

    async fn write_line(&self, line: &str) -> Result<(), McpError> {
        let mut state = self.state.lock().await;
        let connection = state
            .as_mut()
            .ok_or_else(|| McpError::Connection("not connected".to_string()))?;
        connection
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::Connection(format!("write failed: {e}")))?;
        connection
            .stdin
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::Connection(format!("write failed: {e}")))?;
        connection
            .stdin
            .flush()
            .await
            .map_err(|e| McpError::Connection(format!("flush failed: {e}")))?;
        Ok(())
    }
}

/// Fail every pending request with an error from `make_error`.
fn fail_all_pending(pending: &PendingMap, make_error: impl Fn() -> McpError) {
    let mut map = pending.lock();
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(make_error()));
    }
}

/// Background reader: newline-delimited JSON from the child's stdout.
async fn read_loop(
    server_id: String,
    stdout: tokio::process::ChildStdout,
    pending: Arc<PendingMap>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let parsed: Value = match serde_json::from_str(trimmed) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(server = %server_id, error = %e, "malformed json line skipped");
                        continue;
                    }
                };
                dispatch(&server_id, parsed, &pending);
            }
            Ok(None) => {
                tracing::warn!(server = %server_id, "server stdout closed");
                break;
            }
            Err(e) => {
                tracing::error!(server = %server_id, error = %e, "read failed");
                break;
            }
        }
    }
    fail_all_pending(&pending, || {
        McpError::Connection("server stdout closed".to_string())
    });
}

/// Route one message: responses go to their pending future, notifications
/// are logged.
fn dispatch(server_id: &str, message: Value, pending: &PendingMap) {
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        tracing::debug!(
            server = %server_id,
            method = %message.get("method").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "notification received"
        );
        return;
    };

    let Some(tx) = pending.lock().remove(&id) else {
        tracing::warn!(server = %server_id, id, "response for unknown request");
        return;
    };

    if let Some(error) = message.get("error") {
        let parsed: RpcError = serde_json::from_value(error.clone()).unwrap_or(RpcError {
            code: 0,
            message: error.to_string(),
        });
        let _ = tx.send(Err(McpError::Protocol {
            code: parsed.code,
            message: parsed.message,
        }));
        return;
    }

    match message.get("result") {
        Some(result) => {
            let _ = tx.send(Ok(result.clone()));
        }
        None => {
            let _ = tx.send(Err(McpError::Protocol {
                code: 0,
                message: "response carries neither result nor error".to_string(),
            }));
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
