// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task runner: drives one task through the state machine.
//!
//! ```text
//! created ─► intent_processing ─► planning ─► {awaiting_approval | executing}
//! awaiting_approval ─► executing (on approval)
//! executing ─► verifying
//! verifying ─► succeeded | planning (gate failure, re-plan)
//! any ─► failed | canceled | blocked (terminal)
//! ```
//!
//! Each iteration reloads the task row, checks timeout and cancellation,
//! heartbeats, drives the current state, and sleeps briefly. A hard cap
//! on iterations is the safety net against runaway loops.

mod executing;
mod planning;
mod recovery;
mod verifying;

use crate::artifacts::ArtifactStore;
use crate::bus::EventBus;
use crate::error::EngineError;
use crate::lease::LeaseManager;
use crate::pipeline::PipelineSuite;
use crate::settings::{EffectiveSettings, ProjectSettingsMap};
use crate::steps::StepTracker;
use fm_adapters::AdapterRegistry;
use fm_core::{
    AuditLevel, Clock, Event, EventKind, ExitReason, IdGen, LineageEntry, LineageKind, PauseState,
    Task, TaskId, TaskStatus,
};
use fm_gates::DoneGateRunner;
use fm_storage::Store;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Checkpoint cadence for iteration-counter recovery.
const ITERATION_CHECKPOINT_EVERY: u32 = 10;

/// Runner tuning.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Hard cap on loop iterations (safety net, not a business rule).
    pub max_iterations: u32,
    pub iteration_sleep: Duration,
    pub artifacts_root: PathBuf,
    pub worker_id: String,
    pub lease_ttl_ms: u64,
    /// Tool used when neither route plan nor project settings say
    /// otherwise.
    pub default_runner: String,
    pub working_dir: PathBuf,
    pub projects: ProjectSettingsMap,
}

impl RunnerConfig {
    pub fn new(artifacts_root: PathBuf, working_dir: PathBuf) -> Self {
        Self {
            max_iterations: 100,
            iteration_sleep: Duration::from_millis(50),
            artifacts_root,
            worker_id: "runner-1".to_string(),
            lease_ttl_ms: 30_000,
            default_runner: "claude-cli".to_string(),
            working_dir,
            projects: ProjectSettingsMap::new(),
        }
    }
}

/// Mutable per-run state.
pub(crate) struct RunCtx {
    pub iteration: u32,
    pub skip_planning: bool,
}

/// Drives one task at a time. Cheap to clone the pieces it holds; one
/// runner instance per running task.
pub struct TaskRunner<C: Clock, G: IdGen> {
    pub(crate) store: Store,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) clock: C,
    pub(crate) id_gen: G,
    pub(crate) pipelines: Arc<dyn PipelineSuite>,
    pub(crate) gates: DoneGateRunner,
    pub(crate) registry: AdapterRegistry,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) steps: StepTracker<C, G>,
    pub(crate) leases: LeaseManager<C>,
    pub(crate) config: RunnerConfig,
}

impl<C: Clock, G: IdGen> TaskRunner<C, G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        bus: Arc<EventBus>,
        clock: C,
        id_gen: G,
        pipelines: Arc<dyn PipelineSuite>,
        registry: AdapterRegistry,
        config: RunnerConfig,
    ) -> Self {
        let steps = StepTracker::new(store.clone(), clock.clone(), id_gen.clone());
        let leases = LeaseManager::new(
            store.clone(),
            clock.clone(),
            config.worker_id.clone(),
            config.lease_ttl_ms,
        );
        let artifacts = ArtifactStore::new(config.artifacts_root.clone());
        let gates = DoneGateRunner::new(config.working_dir.clone());
        Self {
            store,
            bus,
            clock,
            id_gen,
            pipelines,
            gates,
            registry,
            artifacts,
            steps,
            leases,
            config,
        }
    }

    /// Replace the gate runner (custom gate commands, tighter timeouts).
    pub fn with_gate_runner(mut self, gates: DoneGateRunner) -> Self {
        self.gates = gates;
        self
    }

    /// Run the task to a terminal state. Always returns the exit reason;
    /// internal failures become `fatal_error`.
    pub async fn run(&self, task_id: &str) -> Result<ExitReason, EngineError> {
        let runner_ref = format!("{}:{}", self.config.worker_id, self.id_gen.next());
        self.lineage(task_id, LineageKind::RunnerSpawn, &runner_ref, "spawn");
        self.audit(
            task_id,
            AuditLevel::Info,
            "runner_spawned",
            serde_json::json!({"worker_id": self.config.worker_id}),
        );

        let exit = match self.run_inner(task_id).await {
            Ok(exit) => exit,
            Err(e) => {
                tracing::error!(task = task_id, error = %e, "runner fatal error");
                self.audit(
                    task_id,
                    AuditLevel::Error,
                    "runner_fatal_error",
                    serde_json::json!({"error": e.to_string()}),
                );
                self.fail_if_running(task_id);
                self.emit(
                    EventKind::TaskFailed,
                    task_id,
                    payload(&[("error", Value::String(e.to_string()))]),
                );
                ExitReason::FatalError
            }
        };

        if let Err(e) = self
            .store
            .update_exit_reason(task_id, exit, self.clock.epoch_ms())
        {
            tracing::warn!(task = task_id, error = %e, "exit reason backfill failed");
        }
        self.lineage(task_id, LineageKind::RunnerExit, exit.as_str(), "exit");
        self.audit(
            task_id,
            AuditLevel::Info,
            "runner_exited",
            serde_json::json!({"exit_reason": exit.as_str()}),
        );
        Ok(exit)
    }

    async fn run_inner(&self, task_id: &str) -> Result<ExitReason, EngineError> {
        let mut ctx = self.try_recover(task_id)?;
        self.start_timeout_clock(task_id)?;

        while ctx.iteration < self.config.max_iterations {
            ctx.iteration += 1;

            // 1. Reload; a terminal row means someone else finished it.
            let task = self
                .store
                .get_task(task_id)?
                .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
            if task.is_terminal() {
                return Ok(task
                    .exit_reason
                    .or_else(|| task.implied_exit_reason())
                    .unwrap_or(ExitReason::Done));
            }

            // 2. Timeout.
            if let Some(exit) = self.check_timeout(&task)? {
                return Ok(exit);
            }

            // 3. Cooperative cancel.
            if task.metadata.cancel_requested {
                return Ok(self.cancel_cleanup(&task)?);
            }

            // 4. Heartbeat.
            self.heartbeat(&task)?;

            // Periodic iteration checkpoint for recovery.
            if ctx.iteration % ITERATION_CHECKPOINT_EVERY == 0 {
                let step = self.steps.begin_step(
                    task_id,
                    "iteration_start",
                    serde_json::json!({"iteration": ctx.iteration}),
                    None,
                );
                self.steps
                    .commit_step(&step, fm_core::EvidencePack::default())?;
            }

            // 5. Drive the current state.
            let exit = match task.status {
                TaskStatus::Created => {
                    self.set_status(&task.id, TaskStatus::IntentProcessing)?;
                    None
                }
                TaskStatus::IntentProcessing => {
                    self.set_status(&task.id, TaskStatus::Planning)?;
                    None
                }
                TaskStatus::Planning => self.drive_planning(&mut ctx, &task).await?,
                TaskStatus::AwaitingApproval => {
                    // Parked until approval or cancellation.
                    None
                }
                TaskStatus::Executing => self.drive_executing(&mut ctx, &task).await?,
                TaskStatus::Verifying => self.drive_verifying(&mut ctx, &task).await?,
                TaskStatus::Succeeded
                | TaskStatus::Failed
                | TaskStatus::Canceled
                | TaskStatus::Blocked => task.implied_exit_reason(),
            };
            if let Some(exit) = exit {
                return Ok(exit);
            }

            // 6. Never busy-loop.
            tokio::time::sleep(self.config.iteration_sleep).await;
        }

        self.audit(
            task_id,
            AuditLevel::Error,
            "max_iterations_exceeded",
            serde_json::json!({"max_iterations": self.config.max_iterations}),
        );
        self.fail_if_running(task_id);
        Ok(ExitReason::MaxIterations)
    }

    /// Approve a task parked at `awaiting_approval`.
    pub fn approve(&self, task_id: &str) -> Result<(), EngineError> {
        let task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
        if task.status != TaskStatus::AwaitingApproval {
            return Err(EngineError::Pipeline(format!(
                "task {task_id} is not awaiting approval (status {})",
                task.status
            )));
        }
        let mut metadata = task.metadata.clone();
        metadata.pause.state = PauseState::None;
        metadata.pause.reason = None;
        self.store
            .set_task_metadata(task_id, &metadata, self.clock.epoch_ms())?;
        self.set_status(&task.id, TaskStatus::Executing)?;
        self.emit(EventKind::TaskResumed, task_id, Map::new());
        Ok(())
    }

    /// Request cooperative cancellation; the loop honours it at the next
    /// iteration boundary.
    pub fn request_cancel(&self, task_id: &str) -> Result<(), EngineError> {
        let task = self
            .store
            .get_task(task_id)?
            .ok_or_else(|| EngineError::TaskNotFound(task_id.to_string()))?;
        if task.is_terminal() {
            return Ok(());
        }
        let mut metadata = task.metadata.clone();
        metadata.cancel_requested = true;
        self.store
            .set_task_metadata(task_id, &metadata, self.clock.epoch_ms())?;
        self.audit(
            task_id,
            AuditLevel::Info,
            "cancel_requested",
            serde_json::json!({}),
        );
        Ok(())
    }

    // ---- shared helpers ----

    fn start_timeout_clock(&self, task_id: &str) -> Result<(), EngineError> {
        let Some(task) = self.store.get_task(task_id)? else {
            return Ok(());
        };
        if task.is_terminal() || task.metadata.timeout_state.started_at_ms != 0 {
            return Ok(());
        }
        let mut metadata = task.metadata.clone();
        let now = self.clock.epoch_ms();
        metadata.timeout_state.started_at_ms = now;
        metadata.timeout_state.heartbeat_at_ms = now;
        self.store.set_task_metadata(task_id, &metadata, now)?;
        Ok(())
    }

    /// Warning limit audits once; the hard limit fails the task.
    fn check_timeout(&self, task: &Task) -> Result<Option<ExitReason>, EngineError> {
        let state = &task.metadata.timeout_state;
        if state.started_at_ms == 0 {
            return Ok(None);
        }
        let elapsed = self.clock.epoch_ms().saturating_sub(state.started_at_ms);
        let config = &task.metadata.timeout;

        if elapsed >= config.hard_ms {
            self.warn_timeout_once(task, elapsed)?;
            self.audit(
                task.id.as_str(),
                AuditLevel::Error,
                "timeout_exceeded",
                serde_json::json!({"elapsed_ms": elapsed, "hard_ms": config.hard_ms}),
            );
            self.fail_if_running(task.id.as_str());
            self.emit(
                EventKind::TaskFailed,
                task.id.as_str(),
                payload(&[("error", Value::String("hard timeout exceeded".into()))]),
            );
            return Ok(Some(ExitReason::Timeout));
        }
        if elapsed >= config.warning_ms {
            self.warn_timeout_once(task, elapsed)?;
        }
        Ok(None)
    }

    fn warn_timeout_once(&self, task: &Task, elapsed: u64) -> Result<(), EngineError> {
        if task.metadata.timeout_state.warned {
            return Ok(());
        }
        self.audit(
            task.id.as_str(),
            AuditLevel::Warn,
            "timeout_warning",
            serde_json::json!({
                "elapsed_ms": elapsed,
                "warning_ms": task.metadata.timeout.warning_ms,
            }),
        );
        let mut metadata = task.metadata.clone();
        metadata.timeout_state.warned = true;
        self.store
            .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        Ok(())
    }

    /// Remaining budget before the hard limit, as a pipeline timeout.
    pub(crate) fn remaining_budget(&self, task: &Task) -> Duration {
        let state = &task.metadata.timeout_state;
        if state.started_at_ms == 0 {
            return Duration::from_millis(task.metadata.timeout.hard_ms);
        }
        let elapsed = self.clock.epoch_ms().saturating_sub(state.started_at_ms);
        Duration::from_millis(task.metadata.timeout.hard_ms.saturating_sub(elapsed))
    }

    fn heartbeat(&self, task: &Task) -> Result<(), EngineError> {
        let mut metadata = task.metadata.clone();
        metadata.timeout_state.heartbeat_at_ms = self.clock.epoch_ms();
        self.store
            .set_task_metadata(task.id.as_str(), &metadata, self.clock.epoch_ms())?;
        Ok(())
    }

    fn cancel_cleanup(&self, task: &Task) -> Result<ExitReason, EngineError> {
        // Flush what we can, release what we hold, keep partial results.
        self.leases.reap_abandoned()?;
        for item in &task.metadata.work_items {
            let _ = self
                .store
                .release_lease(item.id.as_str(), &self.config.worker_id);
        }
        if !task.metadata.work_items.is_empty() {
            let summary = crate::artifacts::WorkItemsSummary::from_items(
                task.id.as_str(),
                &task.metadata.work_items,
                self.clock.now_iso(),
            );
            let _ = self.artifacts.write_summary(task.id.as_str(), &summary);
        }
        self.audit(
            task.id.as_str(),
            AuditLevel::Info,
            "task_cancelled",
            serde_json::json!({"partial_items": task.metadata.work_items.len()}),
        );
        self.set_status(&task.id, TaskStatus::Canceled)?;
        self.emit(EventKind::TaskCanceled, task.id.as_str(), Map::new());
        Ok(ExitReason::UserCancelled)
    }

    /// Best-effort terminal failure for boundary paths.
    pub(crate) fn fail_if_running(&self, task_id: &str) {
        match self.store.get_task(task_id) {
            Ok(Some(task)) if !task.is_terminal() => {
                if let Err(e) =
                    self.store
                        .update_task_status(task_id, TaskStatus::Failed, self.clock.epoch_ms())
                {
                    tracing::error!(task = task_id, error = %e, "failed to mark task failed");
                } else {
                    self.audit_status_change(task_id, task.status, TaskStatus::Failed);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(task = task_id, error = %e, "task reload failed"),
        }
    }

    pub(crate) fn set_status(
        &self,
        task_id: &TaskId,
        to: TaskStatus,
    ) -> Result<Task, EngineError> {
        let before = self.store.get_task(task_id.as_str())?;
        let task = self
            .store
            .update_task_status(task_id.as_str(), to, self.clock.epoch_ms())?;
        if let Some(before) = before {
            self.audit_status_change(task_id.as_str(), before.status, to);
        }
        self.emit(
            EventKind::TaskStatusChanged,
            task_id.as_str(),
            payload(&[
                ("status", Value::String(to.as_str().to_string())),
            ]),
        );
        Ok(task)
    }

    fn audit_status_change(&self, task_id: &str, from: TaskStatus, to: TaskStatus) {
        self.audit(
            task_id,
            AuditLevel::Info,
            "status_changed",
            serde_json::json!({"from": from.as_str(), "to": to.as_str()}),
        );
    }

    pub(crate) fn audit(
        &self,
        task_id: &str,
        level: AuditLevel,
        event_type: &str,
        payload: Value,
    ) {
        if let Err(e) = self.store.audit(
            &TaskId::new(task_id),
            self.clock.now_iso(),
            level,
            event_type,
            payload,
        ) {
            tracing::error!(task = task_id, error = %e, "audit write failed");
        }
    }

    pub(crate) fn lineage(&self, task_id: &str, kind: LineageKind, ref_id: &str, phase: &str) {
        let entry = LineageEntry::new(TaskId::new(task_id), kind, ref_id, phase);
        if let Err(e) = self.store.append_lineage(&entry) {
            tracing::error!(task = task_id, error = %e, "lineage write failed");
        }
    }

    pub(crate) fn emit(&self, kind: EventKind, task_id: &str, payload: Map<String, Value>) {
        self.bus
            .emit(&Event::task(kind, task_id, self.clock.now_iso(), payload));
    }

    /// Effective settings for the task, after project inheritance.
    pub(crate) fn effective_settings(&self, task: &Task) -> EffectiveSettings {
        EffectiveSettings::resolve(
            task,
            &self.config.projects,
            &self.config.default_runner,
            &self.config.working_dir,
        )
    }
}

/// Small payload-building helper.
pub(crate) fn payload(fields: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

#[cfg(test)]
#[path = "../runner_tests.rs"]
mod tests;
