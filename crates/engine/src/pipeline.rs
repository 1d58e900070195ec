// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipelines the runner drives: planning, per-item execution, and the
//! coordinator fallback when a plan declares no work items.

use crate::artifacts::PlanStage;
use crate::error::EngineError;
use crate::idempotency::LlmCache;
use async_trait::async_trait;
use fm_adapters::{AdapterRegistry, OutputKind, ToolRuntime, ToolTask};
use fm_core::{Clock, Task, WorkItem, WorkItemId, WorkItemOutput};
use std::path::PathBuf;
use std::sync::Arc;

/// What planning produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutcome {
    pub summary: String,
    pub stages: Vec<PlanStage>,
    pub work_items: Vec<WorkItem>,
    /// Pause point the plan declares, validated by the pause gate.
    pub pause_checkpoint: Option<String>,
}

/// What the coordinator produced when no work items were declared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinatorOutcome {
    pub commits: Vec<(String, String)>,
    pub artifacts: Vec<String>,
    pub execution_request_ids: Vec<String>,
}

/// The pipelines a runner consumes.
#[async_trait]
pub trait PipelineSuite: Send + Sync {
    async fn plan(&self, task: &Task) -> Result<PlanOutcome, EngineError>;

    async fn execute_item(
        &self,
        task: &Task,
        item: &WorkItem,
    ) -> Result<WorkItemOutput, EngineError>;

    async fn coordinate(&self, task: &Task) -> Result<CoordinatorOutcome, EngineError>;
}

/// Production pipeline backed by the tool runtime.
///
/// Planning goes through the LLM output cache; execution calls the routed
/// adapter and turns its diff into a work-item output.
pub struct ToolPipeline<C: Clock> {
    registry: AdapterRegistry,
    runtime: Arc<ToolRuntime>,
    cache: LlmCache<C>,
    default_tool: String,
    repo_path: PathBuf,
}

impl<C: Clock> ToolPipeline<C> {
    pub fn new(
        registry: AdapterRegistry,
        runtime: Arc<ToolRuntime>,
        cache: LlmCache<C>,
        default_tool: impl Into<String>,
        repo_path: PathBuf,
    ) -> Self {
        Self {
            registry,
            runtime,
            cache,
            default_tool: default_tool.into(),
            repo_path,
        }
    }

    fn tool_for(&self, task: &Task) -> String {
        task.metadata
            .route_plan
            .as_ref()
            .map(|plan| plan.primary.clone())
            .unwrap_or_else(|| self.default_tool.clone())
    }

    fn plan_instruction(task: &Task) -> String {
        let request = task
            .metadata
            .nl_request
            .as_deref()
            .unwrap_or(task.title.as_str());
        match &task.metadata.gate_failure_context {
            Some(ctx) => format!(
                "Plan the implementation of: {request}\n\
                 The previous attempt failed gate '{}' (exit {}): {}\n\
                 Revise the plan to address that failure.",
                ctx.gate_name, ctx.exit_code, ctx.summary
            ),
            None => format!("Plan the implementation of: {request}"),
        }
    }
}

#[async_trait]
impl<C: Clock> PipelineSuite for ToolPipeline<C> {
    async fn plan(&self, task: &Task) -> Result<PlanOutcome, EngineError> {
        let tool = self.tool_for(task);
        let adapter = self.registry.get(&tool)?;
        let instruction = Self::plan_instruction(task);

        let mut tool_task =
            ToolTask::new(task.id.as_str(), instruction.clone(), self.repo_path.clone());
        tool_task.expected_output = OutputKind::Plan;

        let runtime = Arc::clone(&self.runtime);
        let tool_name = tool.clone();
        let raw = self
            .cache
            .get_or_generate("plan", &tool, &instruction, task.id.as_str(), || async move {
                let result = runtime.run(&adapter, &tool_task, false).await?;
                if result.status.is_failure() {
                    return Err(EngineError::Pipeline(format!(
                        "planning via {tool_name} failed: {}",
                        result.error_message.unwrap_or_default()
                    )));
                }
                Ok(result.stdout.unwrap_or_default())
            })
            .await?;

        // A structured plan is preferred; free-form output degrades to one
        // catch-all work item.
        let parsed: Option<serde_json::Value> = serde_json::from_str(&raw).ok();
        let outcome = match parsed {
            Some(value) => PlanOutcome {
                summary: value
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or("generated plan")
                    .to_string(),
                stages: value
                    .get("stages")
                    .and_then(|v| v.as_array())
                    .map(|stages| {
                        stages
                            .iter()
                            .map(|s| PlanStage {
                                name: s
                                    .get("name")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("stage")
                                    .to_string(),
                                description: s
                                    .get("description")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default()
                                    .to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                work_items: value
                    .get("work_items")
                    .and_then(|v| v.as_array())
                    .map(|items| {
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| {
                                let id = item
                                    .get("id")
                                    .and_then(|v| v.as_str())
                                    .map(str::to_string)
                                    .unwrap_or_else(|| format!("{}-wi-{}", task.id, i + 1));
                                let title = item
                                    .get("title")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or("work item")
                                    .to_string();
                                WorkItem::new(WorkItemId::new(id), title)
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                pause_checkpoint: Some("open_plan".to_string()),
            },
            None => PlanOutcome {
                summary: raw.lines().next().unwrap_or("generated plan").to_string(),
                stages: Vec::new(),
                work_items: vec![WorkItem::new(
                    WorkItemId::new(format!("{}-wi-1", task.id)),
                    task.title.clone(),
                )],
                pause_checkpoint: Some("open_plan".to_string()),
            },
        };
        Ok(outcome)
    }

    async fn execute_item(
        &self,
        task: &Task,
        item: &WorkItem,
    ) -> Result<WorkItemOutput, EngineError> {
        let tool = self.tool_for(task);
        let adapter = self.registry.get(&tool)?;
        let tool_task = ToolTask::new(
            task.id.as_str(),
            format!("Implement work item '{}': {}", item.id, item.title),
            self.repo_path.clone(),
        );
        let result = self.runtime.run(&adapter, &tool_task, false).await?;
        if result.status.is_failure() {
            return Err(EngineError::Pipeline(format!(
                "work item {} failed via {tool}: {}",
                item.id,
                result.error_message.unwrap_or_default()
            )));
        }
        Ok(WorkItemOutput {
            files_changed: result.files_touched,
            commands_run: vec![format!("{tool} run {}", result.tool_run_id)],
            tests_run: Vec::new(),
            evidence: None,
            handoff_notes: None,
            replaces: None,
        })
    }

    async fn coordinate(&self, task: &Task) -> Result<CoordinatorOutcome, EngineError> {
        let tool = self.tool_for(task);
        let adapter = self.registry.get(&tool)?;
        let tool_task = ToolTask::new(
            task.id.as_str(),
            Self::plan_instruction(task),
            self.repo_path.clone(),
        );
        let result = self.runtime.run(&adapter, &tool_task, false).await?;
        if result.status.is_failure() {
            return Err(EngineError::Pipeline(format!(
                "coordinator run via {tool} failed: {}",
                result.error_message.unwrap_or_default()
            )));
        }
        Ok(CoordinatorOutcome {
            commits: Vec::new(),
            artifacts: Vec::new(),
            execution_request_ids: vec![result.tool_run_id],
        })
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Scripted pipeline suite for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    /// One scripted planning round.
    #[derive(Debug, Clone)]
    pub struct ScriptedPlan {
        pub outcome: Result<PlanOutcome, String>,
        /// Sleep before returning, for timeout scenarios.
        pub delay: Duration,
    }

    /// A pipeline suite driven entirely by the test.
    #[derive(Default)]
    pub struct FakePipeline {
        plans: Mutex<VecDeque<ScriptedPlan>>,
        item_failures: Mutex<HashMap<String, String>>,
        plan_calls: Mutex<u32>,
    }

    impl FakePipeline {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful plan with the given work items.
        pub fn push_plan(&self, work_items: Vec<WorkItem>, pause_checkpoint: Option<&str>) {
            self.plans.lock().push_back(ScriptedPlan {
                outcome: Ok(PlanOutcome {
                    summary: "scripted plan".to_string(),
                    stages: vec![PlanStage {
                        name: "implement".to_string(),
                        description: "do the work".to_string(),
                    }],
                    work_items,
                    pause_checkpoint: pause_checkpoint.map(str::to_string),
                }),
                delay: Duration::ZERO,
            });
        }

        pub fn push_scripted(&self, plan: ScriptedPlan) {
            self.plans.lock().push_back(plan);
        }

        /// Make one item fail with the given error.
        pub fn fail_item(&self, item_id: &str, error: &str) {
            self.item_failures
                .lock()
                .insert(item_id.to_string(), error.to_string());
        }

        pub fn plan_calls(&self) -> u32 {
            *self.plan_calls.lock()
        }
    }

    #[async_trait]
    impl PipelineSuite for FakePipeline {
        async fn plan(&self, task: &Task) -> Result<PlanOutcome, EngineError> {
            *self.plan_calls.lock() += 1;
            let scripted = self.plans.lock().pop_front();
            let scripted = scripted.unwrap_or_else(|| ScriptedPlan {
                outcome: Ok(PlanOutcome {
                    summary: format!("default plan for {}", task.id),
                    stages: Vec::new(),
                    work_items: Vec::new(),
                    pause_checkpoint: Some("open_plan".to_string()),
                }),
                delay: Duration::ZERO,
            });
            if !scripted.delay.is_zero() {
                tokio::time::sleep(scripted.delay).await;
            }
            scripted.outcome.map_err(EngineError::Pipeline)
        }

        async fn execute_item(
            &self,
            _task: &Task,
            item: &WorkItem,
        ) -> Result<WorkItemOutput, EngineError> {
            if let Some(error) = self.item_failures.lock().get(item.id.as_str()) {
                return Err(EngineError::Pipeline(error.clone()));
            }
            Ok(WorkItemOutput {
                files_changed: vec![format!("src/{}.rs", item.id)],
                commands_run: vec!["cargo check".to_string()],
                tests_run: vec!["unit".to_string()],
                evidence: None,
                handoff_notes: Some(format!("completed {}", item.title)),
                replaces: None,
            })
        }

        async fn coordinate(&self, task: &Task) -> Result<CoordinatorOutcome, EngineError> {
            Ok(CoordinatorOutcome {
                commits: vec![("deadbeef".to_string(), format!("apply {}", task.title))],
                artifacts: Vec::new(),
                execution_request_ids: vec![format!("{}-exec-1", task.id)],
            })
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
