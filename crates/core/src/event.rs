// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events broadcast on the in-process bus.
//!
//! Every event carries a dotted type name, an ISO-8601 UTC timestamp, a
//! source, the entity it concerns, and a JSON payload. The supervisor
//! derives a stable deduplication key from the kind, entity, and the
//! payload's discriminating fields, so replays of the same logical event
//! collapse to one inbox row.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    #[default]
    Core,
    Webui,
}

/// The entity an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn task(id: impl Into<String>) -> Self {
        Self {
            kind: "task".to_string(),
            id: id.into(),
        }
    }

    pub fn server(id: impl Into<String>) -> Self {
        Self {
            kind: "mcp_server".to_string(),
            id: id.into(),
        }
    }
}

/// Typed event names. Dotted strings are the wire identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    TaskCreated,
    TaskStatusChanged,
    TaskProgress,
    TaskPaused,
    TaskResumed,
    TaskRerouted,
    TaskFailed,
    TaskCompleted,
    TaskCanceled,
    StepStarted,
    StepCompleted,
    StepFailed,
    GatePassed,
    GateFailed,
    ModeViolation,
    RecoveryResumed,
    ToolCallRecorded,
    /// Catch-all for event types minted after this build.
    Custom(String),
}

impl EventKind {
    /// Dotted namespace name, e.g. `task.progress`.
    pub fn name(&self) -> &str {
        match self {
            EventKind::TaskCreated => "task.created",
            EventKind::TaskStatusChanged => "task.status_changed",
            EventKind::TaskProgress => "task.progress",
            EventKind::TaskPaused => "task.paused",
            EventKind::TaskResumed => "task.resumed",
            EventKind::TaskRerouted => "task.rerouted",
            EventKind::TaskFailed => "task.failed",
            EventKind::TaskCompleted => "task.completed",
            EventKind::TaskCanceled => "task.canceled",
            EventKind::StepStarted => "step.started",
            EventKind::StepCompleted => "step.completed",
            EventKind::StepFailed => "step.failed",
            EventKind::GatePassed => "gate.passed",
            EventKind::GateFailed => "gate.failed",
            EventKind::ModeViolation => "mode.violation",
            EventKind::RecoveryResumed => "recovery.resumed_from_checkpoint",
            EventKind::ToolCallRecorded => "tool.call_recorded",
            EventKind::Custom(name) => name,
        }
    }

    /// Parse a dotted name back into a kind; unknown names become `Custom`.
    pub fn parse(name: &str) -> Self {
        match name {
            "task.created" => EventKind::TaskCreated,
            "task.status_changed" => EventKind::TaskStatusChanged,
            "task.progress" => EventKind::TaskProgress,
            "task.paused" => EventKind::TaskPaused,
            "task.resumed" => EventKind::TaskResumed,
            "task.rerouted" => EventKind::TaskRerouted,
            "task.failed" => EventKind::TaskFailed,
            "task.completed" => EventKind::TaskCompleted,
            "task.canceled" => EventKind::TaskCanceled,
            "step.started" => EventKind::StepStarted,
            "step.completed" => EventKind::StepCompleted,
            "step.failed" => EventKind::StepFailed,
            "gate.passed" => EventKind::GatePassed,
            "gate.failed" => EventKind::GateFailed,
            "mode.violation" => EventKind::ModeViolation,
            "recovery.resumed_from_checkpoint" => EventKind::RecoveryResumed,
            "tool.call_recorded" => EventKind::ToolCallRecorded,
            other => EventKind::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(EventKind::parse(&name))
    }
}

/// An event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// ISO-8601 UTC timestamp.
    pub ts: String,
    #[serde(default)]
    pub source: EventSource,
    pub entity: EntityRef,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    /// Build a core-sourced event about a task.
    pub fn task(kind: EventKind, task_id: &str, ts: String, payload: Map<String, Value>) -> Self {
        Self {
            kind,
            ts,
            source: EventSource::Core,
            entity: EntityRef::task(task_id),
            payload,
        }
    }

    /// Task id, when the entity is a task.
    pub fn task_id(&self) -> Option<&str> {
        (self.entity.kind == "task").then_some(self.entity.id.as_str())
    }

    /// Stable identity used for inbox deduplication.
    ///
    /// Lifecycle events collapse per entity; repeatable events (steps,
    /// gates, progress) are discriminated by the payload fields that make
    /// them distinct occurrences.
    pub fn dedupe_key(&self) -> String {
        let mut key = format!("{}:{}", self.kind.name(), self.entity.id);
        for field in ["step", "item_id", "gate", "attempt", "seq"] {
            if let Some(v) = self.payload.get(field) {
                match v {
                    Value::String(s) => {
                        key.push(':');
                        key.push_str(s);
                    }
                    other => {
                        key.push(':');
                        key.push_str(&other.to_string());
                    }
                }
            }
        }
        key
    }

    pub fn log_summary(&self) -> String {
        format!(
            "{} {}={}",
            self.kind.name(),
            self.entity.kind,
            self.entity.id
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
