//! MCP health failover behavior.

use fm_adapters::{McpClient, McpError, McpHealthMonitor, McpHealthStatus, McpServerConfig};
use std::sync::Arc;

fn refusing_server() -> McpServerConfig {
    McpServerConfig {
        id: "refuser".to_string(),
        enabled: true,
        transport: Default::default(),
        // Exits immediately: every connect attempt fails.
        command: vec!["definitely-not-a-real-mcp-server-2f91".to_string()],
        allow_tools: Vec::new(),
        deny_side_effect_tags: Vec::new(),
        env: Default::default(),
        timeout_ms: 500,
        package_id: None,
    }
}

/// A server that refuses connections goes UNHEALTHY after exactly
/// `failure_threshold` checks, each transition is logged once, and
/// list_tools surfaces connection errors.
#[tokio::test]
async fn refusing_server_flips_unhealthy_at_threshold() {
    let client = Arc::new(McpClient::new(refusing_server()));
    assert!(matches!(
        client.connect().await.unwrap_err(),
        McpError::Connection(_)
    ));
    assert!(matches!(
        client.list_tools().await.unwrap_err(),
        McpError::Connection(_)
    ));

    let monitor = McpHealthMonitor::new(Arc::clone(&client), 3, 5_000);
    let mut statuses = Vec::new();
    for _ in 0..4 {
        statuses.push(monitor.check_and_record().await.status);
    }
    assert_eq!(
        statuses,
        vec![
            McpHealthStatus::Degraded,
            McpHealthStatus::Degraded,
            McpHealthStatus::Unhealthy,
            McpHealthStatus::Unhealthy,
        ]
    );
    assert_eq!(monitor.consecutive_failures(), 4);
}
