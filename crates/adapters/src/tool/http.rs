// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud chat adapter: an OpenAI-style chat-completions endpoint driven
//! over HTTP. The model is asked for a unified diff (or analysis text)
//! and never touches the repository.

use crate::tool::mock::mock_result;
use crate::tool::{
    AdapterError, DiffQuality, ErrorCategory, HealthState, OutputKind, Provider, ToolAdapter,
    ToolCapabilities, ToolHealth, ToolResult, ToolStatus, ToolTask,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Adapter for a cloud chat-completions API.
pub struct CloudChatAdapter {
    tool_name: String,
    model_id: String,
    endpoint: String,
    api_key_env: String,
}

impl CloudChatAdapter {
    pub fn new(
        tool_name: impl Into<String>,
        model_id: impl Into<String>,
        endpoint: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            model_id: model_id.into(),
            endpoint: endpoint.into(),
            api_key_env: api_key_env.into(),
        }
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    fn prompt_for(&self, task: &ToolTask) -> String {
        match task.expected_output {
            OutputKind::Diff => format!(
                "Produce a unified diff (and only a unified diff) implementing:\n{}",
                task.instruction
            ),
            _ => task.instruction.clone(),
        }
    }
}

#[async_trait]
impl ToolAdapter for CloudChatAdapter {
    fn name(&self) -> &str {
        &self.tool_name
    }

    async fn health_check(&self) -> ToolHealth {
        if self.api_key().is_none() {
            return ToolHealth::failed(
                HealthState::NotConfigured,
                format!("API key env {} is not set", self.api_key_env),
            );
        }
        ToolHealth::connected(format!("{} ({}) configured", self.tool_name, self.model_id))
    }

    async fn run(&self, task: &ToolTask, allow_mock: bool) -> Result<ToolResult, AdapterError> {
        let run_id = uuid::Uuid::new_v4().to_string();

        let Some(api_key) = self.api_key() else {
            let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Cloud);
            result.model_id = Some(self.model_id.clone());
            result.endpoint = Some(self.endpoint.clone());
            result.error_category = Some(ErrorCategory::Config);
            result.error_message = Some(format!("API key env {} is not set", self.api_key_env));
            return Ok(result);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(task.timeout_seconds))
            .build()
            .map_err(|e| AdapterError::Http(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model_id,
            "messages": [{"role": "user", "content": self.prompt_for(task)}],
        });

        let response = client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                if e.is_timeout() && allow_mock {
                    return Ok(mock_result(
                        &self.tool_name,
                        task,
                        &run_id,
                        Provider::Cloud,
                        "timeout",
                    ));
                }
                let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Cloud);
                result.model_id = Some(self.model_id.clone());
                result.endpoint = Some(self.endpoint.clone());
                result.status = if e.is_timeout() {
                    ToolStatus::Timeout
                } else {
                    ToolStatus::Failed
                };
                result.error_category = Some(ErrorCategory::Network);
                result.error_message = Some(e.to_string());
                return Ok(result);
            }
        };

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Cloud);
            result.model_id = Some(self.model_id.clone());
            result.endpoint = Some(self.endpoint.clone());
            result.error_category = Some(ErrorCategory::Auth);
            result.error_message = Some(format!("endpoint rejected credentials ({status})"));
            return Ok(result);
        }
        if !status.is_success() {
            let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Cloud);
            result.model_id = Some(self.model_id.clone());
            result.endpoint = Some(self.endpoint.clone());
            result.error_category = Some(ErrorCategory::Network);
            result.error_message = Some(format!("endpoint returned {status}"));
            return Ok(result);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let mut result = ToolResult::empty(&self.tool_name, &run_id, Provider::Cloud);
        result.status = ToolStatus::Success;
        result.model_id = Some(self.model_id.clone());
        result.endpoint = Some(self.endpoint.clone());
        result.output_kind = task.expected_output;
        result.line_count = content.lines().count() as u64;
        match task.expected_output {
            OutputKind::Diff => result.diff = content,
            _ => result.stdout = Some(content),
        }
        Ok(result)
    }

    fn supports(&self) -> ToolCapabilities {
        ToolCapabilities {
            execution_mode: Provider::Cloud,
            supports_diff: true,
            supports_patch: false,
            supports_health_check: true,
            chat: true,
            json_mode: true,
            function_call: true,
            stream: false,
            long_context: true,
            diff_quality: DiffQuality::Medium,
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
