// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The Foreman execution engine: event bus, checkpoint/lease/idempotency
//! managers, the task runner, the supervisor, and the decision recorder.

#[cfg(test)]
mod test_helpers;

mod artifacts;
mod bus;
mod error;
mod idempotency;
mod lease;
mod pipeline;
mod recorder;
mod risk;
mod runner;
mod settings;
mod steps;
mod supervisor;

pub use artifacts::{ArtifactStore, OpenPlanArtifact, PlanStage, WorkItemsSummary};
pub use bus::EventBus;
pub use error::EngineError;
pub use idempotency::{LlmCache, ToolLedger};
pub use lease::{HeldLease, LeaseManager};
pub use pipeline::{CoordinatorOutcome, PipelineSuite, PlanOutcome, ToolPipeline};
pub use recorder::{apply_governance_rules, DecisionRecorder, SignoffError, ADMIN_TOKEN_ENV};
pub use risk::{AuditSink, Finding, RiskSignals, Severity, StoreAuditSink};
pub use runner::{RunnerConfig, TaskRunner};
pub use settings::{EffectiveSettings, ProjectSettings, ProjectSettingsMap};
pub use steps::{PendingStep, StepTracker};
pub use supervisor::{
    OnModeViolation, OnStepCompleted, OnTaskCreated, OnTaskFailed, Policy, PolicyCtx,
    PolicyDecision, PolicyRouter, PolicyVerdict, Supervisor, SupervisorConfig,
};

#[cfg(any(test, feature = "test-support"))]
pub use pipeline::fake::{FakePipeline, ScriptedPlan};
