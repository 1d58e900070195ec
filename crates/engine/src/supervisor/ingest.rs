// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dual-channel event ingestion.
//!
//! Fast path: a bus subscription persists each event into the inbox and
//! wakes the loop. Slow path: `poll_sources` reads the task table and
//! inserts any lifecycle events the bus never delivered. Both paths use
//! the same deduplication keys, so they collapse onto one row.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::supervisor::Supervisor;
use fm_core::{Clock, Event, EventKind, IdGen, TaskStatus};
use fm_storage::{EventSourceTag, SupervisorEvent};
use std::sync::Arc;

/// Convert a bus event into its inbox form.
pub(crate) fn supervisor_event(event: &Event, source: EventSourceTag) -> SupervisorEvent {
    SupervisorEvent {
        event_id: event.dedupe_key(),
        task_id: event
            .task_id()
            .map(str::to_string)
            .unwrap_or_else(|| event.entity.id.clone()),
        event_type: event.kind.name().to_string(),
        source,
        payload: serde_json::Value::Object(event.payload.clone()),
    }
}

impl<C: Clock, G: IdGen + 'static> Supervisor<C, G> {
    /// Ingest one event (fast path). Returns true when it was new.
    pub fn ingest_event(&self, event: &Event, source: EventSourceTag) -> bool {
        let supervisor_event = supervisor_event(event, source);
        match self
            .store()
            .insert_inbox_event(&supervisor_event, &event.ts)
        {
            Ok(true) => {
                self.wake();
                true
            }
            Ok(false) => false,
            Err(e) => {
                // Never let ingestion failures reach the bus.
                tracing::error!(
                    event = %supervisor_event.event_id,
                    error = %e,
                    "inbox insert failed"
                );
                false
            }
        }
    }

    /// Subscribe the fast path to the bus.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let supervisor = Arc::clone(self);
        bus.subscribe(move |event| {
            supervisor.ingest_event(event, EventSourceTag::Eventbus);
        });
        tracing::info!("supervisor subscribed to event bus");
    }

    /// Slow path: derive lifecycle events from the task table and insert
    /// whatever is not already present. Returns how many were new.
    pub fn poll_sources(&self) -> Result<u32, EngineError> {
        let now_iso = self.clock().now_iso();
        let mut inserted = 0;
        for task in self.store().list_tasks()? {
            let mut events = vec![SupervisorEvent {
                event_id: format!("task.created:{}", task.id),
                task_id: task.id.to_string(),
                event_type: EventKind::TaskCreated.name().to_string(),
                source: EventSourceTag::Polling,
                payload: serde_json::json!({
                    "title": task.title,
                    "run_mode": task.run_mode.as_str(),
                    "status": task.status.as_str(),
                }),
            }];
            if task.status == TaskStatus::Failed {
                events.push(SupervisorEvent {
                    event_id: format!("task.failed:{}", task.id),
                    task_id: task.id.to_string(),
                    event_type: EventKind::TaskFailed.name().to_string(),
                    source: EventSourceTag::Polling,
                    payload: serde_json::json!({
                        "error": "task observed failed during poll",
                        "exit_reason": task.exit_reason.map(|r| r.as_str()),
                    }),
                });
            }
            if task.status == TaskStatus::Succeeded {
                events.push(SupervisorEvent {
                    event_id: format!("task.completed:{}", task.id),
                    task_id: task.id.to_string(),
                    event_type: EventKind::TaskCompleted.name().to_string(),
                    source: EventSourceTag::Polling,
                    payload: serde_json::json!({
                        "exit_reason": task.exit_reason.map(|r| r.as_str()),
                    }),
                });
            }
            for event in events {
                if self.store().insert_inbox_event(&event, &now_iso)? {
                    inserted += 1;
                }
            }
        }
        if inserted > 0 {
            tracing::debug!(inserted, "poll recovered events the bus missed");
            self.wake();
        }
        Ok(inserted)
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
