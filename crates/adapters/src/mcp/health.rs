// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health monitoring for MCP servers.
//!
//! A check is: dead process → unhealthy/degraded by threshold; otherwise
//! time a `tools/list` — slow responses degrade, failures count toward
//! the consecutive-failure threshold, a single success resets it.

use crate::mcp::McpClient;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Three-state health model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpHealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of one health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpHealthReport {
    pub status: McpHealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub consecutive_failures: u32,
}

/// Watches one client, tracking consecutive failures.
pub struct McpHealthMonitor {
    client: Arc<McpClient>,
    failure_threshold: u32,
    degraded_threshold_ms: u64,
    consecutive_failures: AtomicU32,
    last_status: Mutex<Option<McpHealthStatus>>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl McpHealthMonitor {
    pub fn new(client: Arc<McpClient>, failure_threshold: u32, degraded_threshold_ms: u64) -> Self {
        Self {
            client,
            failure_threshold: failure_threshold.max(1),
            degraded_threshold_ms,
            consecutive_failures: AtomicU32::new(0),
            last_status: Mutex::new(None),
            monitor: Mutex::new(None),
        }
    }

    /// Run one health check.
    pub async fn check(&self) -> McpHealthReport {
        if !self.client.is_alive().await {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
            return self.failure_report("server process not running", failures, None);
        }

        let started = Instant::now();
        match self.client.list_tools().await {
            Ok(tools) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.consecutive_failures.store(0, Ordering::SeqCst);
                if elapsed_ms > self.degraded_threshold_ms {
                    McpHealthReport {
                        status: McpHealthStatus::Degraded,
                        message: format!("server responding slowly ({elapsed_ms}ms)"),
                        response_time_ms: Some(elapsed_ms),
                        consecutive_failures: 0,
                    }
                } else {
                    McpHealthReport {
                        status: McpHealthStatus::Healthy,
                        message: format!("{} tools available", tools.len()),
                        response_time_ms: Some(elapsed_ms),
                        consecutive_failures: 0,
                    }
                }
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                self.failure_report(&format!("health check error: {e}"), failures, None)
            }
        }
    }

    fn failure_report(
        &self,
        message: &str,
        failures: u32,
        response_time_ms: Option<u64>,
    ) -> McpHealthReport {
        // Unhealthy flips at exactly the threshold, not before.
        let status = if failures >= self.failure_threshold {
            McpHealthStatus::Unhealthy
        } else {
            McpHealthStatus::Degraded
        };
        McpHealthReport {
            status,
            message: message.to_string(),
            response_time_ms,
            consecutive_failures: failures,
        }
    }

    /// Reset the failure counter (manual recovery hook).
    pub fn reset_failures(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Run a check and record the status, logging only on transitions.
    pub async fn check_and_record(&self) -> McpHealthReport {
        let report = self.check().await;
        let mut last = self.last_status.lock();
        if *last != Some(report.status) {
            tracing::info!(
                server = %self.client.config().id,
                from = ?*last,
                to = ?report.status,
                message = %report.message,
                "mcp health status changed"
            );
            *last = Some(report.status);
        }
        report
    }

    /// Start the background loop. Replaces any previous loop.
    pub fn start_monitoring(self: &Arc<Self>, interval: Duration) {
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = monitor.check_and_record().await;
            }
        });
        if let Some(previous) = self.monitor.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background loop, if running.
    pub fn stop_monitoring(&self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for McpHealthMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
