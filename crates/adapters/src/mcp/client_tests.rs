// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::mcp::{McpError, McpServerConfig};

/// A line-oriented fake MCP server in shell: echoes back well-formed
/// JSON-RPC responses keyed on the request method, reusing the request id.
const FAKE_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf %s "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"serverInfo":{"name":"fake","version":"1.0"}}}\n' "$id";;
    *'"name":"boom"'*)
      printf '{"jsonrpc":"2.0","id":%s,"error":{"code":-32601,"message":"method not found"}}\n' "$id";;
    *'"method":"tools/list"'*)
      printf 'this is not json\n'
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo_tool","description":"echoes"}]}}\n' "$id";;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}]}}\n' "$id";;
  esac
done
"#;

/// Replies to initialize only; every other request hangs.
const SILENT_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf %s "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id";;
  esac
done
"#;

fn config(script: &str, timeout_ms: u64) -> McpServerConfig {
    McpServerConfig {
        id: "fake".to_string(),
        enabled: true,
        transport: Default::default(),
        command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        allow_tools: Vec::new(),
        deny_side_effect_tags: Vec::new(),
        env: Default::default(),
        timeout_ms,
        package_id: None,
    }
}

#[tokio::test]
async fn connect_lists_and_calls_tools() {
    let client = McpClient::new(config(FAKE_SERVER, 5_000));
    client.connect().await.unwrap();
    assert!(client.is_alive().await);

    // The fake emits a garbage line before the tools/list response; the
    // reader must skip it.
    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo_tool");
    assert_eq!(tools[0].description.as_deref(), Some("echoes"));

    let result = client
        .call_tool("echo_tool", serde_json::json!({"text": "hello"}))
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], "ok");

    client.disconnect().await;
    assert!(!client.is_alive().await);
}

#[tokio::test]
async fn server_error_codes_pass_through() {
    let client = McpClient::new(config(FAKE_SERVER, 5_000));
    client.connect().await.unwrap();

    let err = client
        .call_tool("boom", serde_json::json!({}))
        .await
        .unwrap_err();
    match err {
        McpError::Protocol { code, message } => {
            assert_eq!(code, -32601);
            assert!(message.contains("method not found"));
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
    // The connection survives a protocol error.
    assert!(client.is_alive().await);
    client.disconnect().await;
}

#[tokio::test]
async fn requests_time_out_per_server_config() {
    let client = McpClient::new(config(SILENT_SERVER, 200));
    client.connect().await.unwrap();

    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Timeout(200)));

    client.disconnect().await;
}

#[tokio::test]
async fn connecting_to_a_missing_binary_fails() {
    let mut config = config(FAKE_SERVER, 1_000);
    config.command = vec!["definitely-not-a-binary-33ab".to_string()];
    let client = McpClient::new(config);
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, McpError::Connection(_)));
    assert!(!client.is_alive().await);
}

#[tokio::test]
async fn requests_against_disconnected_client_fail() {
    let client = McpClient::new(config(FAKE_SERVER, 1_000));
    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Connection(_)));
}

#[tokio::test]
async fn dead_server_fails_pending_and_reports_not_alive() {
    // Server completes the handshake (initialize + the initialized
    // notification), then exits.
    let script = r#"
IFS= read -r line
id=$(printf %s "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
printf '{"jsonrpc":"2.0","id":%s,"result":{}}\n' "$id"
IFS= read -r line
exit 0
"#;
    let client = McpClient::new(config(script, 2_000));
    client.connect().await.unwrap();

    // Give the child a moment to exit.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(!client.is_alive().await);

    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::Connection(_) | McpError::Timeout(_)));
    client.disconnect().await;
}
