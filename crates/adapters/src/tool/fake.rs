// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake adapter for tests (behind the `test-support` feature).

use crate::tool::{
    AdapterError, DiffQuality, Provider, ToolAdapter, ToolCapabilities, ToolHealth, ToolResult,
    ToolStatus, ToolTask,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One recorded call to the fake.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeCall {
    pub task_id: String,
    pub instruction: String,
    pub allow_mock: bool,
}

/// A tool adapter whose health and results are scripted by the test.
///
/// Results queue FIFO; when the queue is empty the fake serves a default
/// success carrying a one-file diff.
#[derive(Clone)]
pub struct FakeToolAdapter {
    name: String,
    health: Arc<Mutex<ToolHealth>>,
    results: Arc<Mutex<VecDeque<ToolResult>>>,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

impl FakeToolAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health: Arc::new(Mutex::new(ToolHealth::connected("fake"))),
            results: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_health(&self, health: ToolHealth) {
        *self.health.lock() = health;
    }

    pub fn push_result(&self, result: ToolResult) {
        self.results.lock().push_back(result);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().clone()
    }

    /// A well-formed success result for `task`.
    pub fn default_result(name: &str, task: &ToolTask) -> ToolResult {
        let file = task
            .allowed_paths
            .first()
            .cloned()
            .unwrap_or_else(|| "src/lib.rs".to_string());
        let diff = format!(
            "--- a/{file}\n+++ b/{file}\n@@ -1,1 +1,2 @@\n line\n+added for {}\n",
            task.task_id
        );
        let mut result = ToolResult::empty(name, "fake-run", Provider::Local);
        result.status = ToolStatus::Success;
        result.line_count = diff.lines().count() as u64;
        result.diff = diff;
        result.files_touched = vec![file];
        result
    }
}

#[async_trait]
impl ToolAdapter for FakeToolAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> ToolHealth {
        self.health.lock().clone()
    }

    async fn run(&self, task: &ToolTask, allow_mock: bool) -> Result<ToolResult, AdapterError> {
        self.calls.lock().push(FakeCall {
            task_id: task.task_id.clone(),
            instruction: task.instruction.clone(),
            allow_mock,
        });
        let scripted = self.results.lock().pop_front();
        Ok(scripted.unwrap_or_else(|| Self::default_result(&self.name, task)))
    }

    fn supports(&self) -> ToolCapabilities {
        ToolCapabilities {
            execution_mode: Provider::Local,
            supports_diff: true,
            supports_patch: true,
            supports_health_check: true,
            chat: true,
            json_mode: true,
            function_call: false,
            stream: false,
            long_context: false,
            diff_quality: DiffQuality::Medium,
        }
    }
}
