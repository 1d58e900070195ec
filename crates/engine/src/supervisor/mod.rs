// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor: a governance loop over a deduplicated inbox.
//!
//! Events arrive on two channels. The fast path is a bus subscription
//! that persists the event and wakes the loop; the slow path is a
//! bounded-cadence poll over the sources of truth that inserts anything
//! the bus missed. The bus is only ever a wake-up — losing it loses no
//! events.

mod ingest;
pub mod policies;
mod policy;
mod router;

pub use policies::{OnModeViolation, OnStepCompleted, OnTaskCreated, OnTaskFailed};
pub use policy::{Policy, PolicyCtx, PolicyDecision, PolicyVerdict};
pub use router::PolicyRouter;

use crate::error::EngineError;
use crate::recorder::DecisionRecorder;
use fm_core::{
    AuditEntry, AuditLevel, Clock, DecisionType, IdGen, PauseCheckpoint, PauseMetadata, TaskId,
    TaskStatus,
};
use fm_storage::{BacklogMetrics, InboxRow, InboxStatus, Store};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Tuning for the supervisor loop.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Slow-path poll cadence.
    pub poll_interval: Duration,
    /// Pending-row count beyond which polling slows down.
    pub backpressure_threshold: u64,
    /// Age before completed inbox rows are purged.
    pub retention: Duration,
    /// Poll ticks between cleanup passes.
    pub cleanup_every: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            backpressure_threshold: 100,
            retention: Duration::from_secs(7 * 24 * 3600),
            cleanup_every: 60,
        }
    }
}

/// Inbox consumer and policy router.
pub struct Supervisor<C: Clock, G: IdGen> {
    store: Store,
    clock: C,
    recorder: DecisionRecorder<C, G>,
    router: PolicyRouter,
    notify: Notify,
    config: SupervisorConfig,
    backpressure_level: AtomicU32,
}

impl<C: Clock, G: IdGen + 'static> Supervisor<C, G> {
    /// Create a supervisor with the core policies registered.
    pub fn new(store: Store, clock: C, id_gen: G, config: SupervisorConfig) -> Self {
        let recorder = DecisionRecorder::new(store.clone(), clock.clone(), id_gen);
        let mut router = PolicyRouter::new();
        router.register("task.created", Arc::new(OnTaskCreated));
        router.register("step.completed", Arc::new(OnStepCompleted));
        router.register("task.failed", Arc::new(OnTaskFailed));
        router.register("mode.violation", Arc::new(OnModeViolation));
        Self {
            store,
            clock,
            recorder,
            router,
            notify: Notify::new(),
            config,
            backpressure_level: AtomicU32::new(0),
        }
    }

    /// Router access for custom registrations before the loop starts.
    pub fn router_mut(&mut self) -> &mut PolicyRouter {
        &mut self.router
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Wake the main loop.
    pub fn wake(&self) {
        self.notify.notify_one();
    }

    /// Current backlog metrics, for the SLO dashboard.
    pub fn backlog(&self) -> Result<BacklogMetrics, EngineError> {
        Ok(self.store.backlog_metrics(self.clock.now_utc())?)
    }

    /// Purge completed rows past retention. Returns rows removed.
    pub fn cleanup(&self) -> Result<usize, EngineError> {
        let cutoff = self.clock.now_utc()
            - chrono::Duration::milliseconds(self.config.retention.as_millis() as i64);
        Ok(self.store.purge_completed_before(&cutoff.to_rfc3339())?)
    }

    /// Drain the inbox: claim and process rows until none are pending.
    /// Returns the number processed.
    pub fn process_available(&self) -> Result<u32, EngineError> {
        let mut processed = 0;
        while let Some(row) = self.store.claim_next_pending()? {
            self.process_row(&row);
            processed += 1;
        }
        Ok(processed)
    }

    /// Route one claimed row to its policy. The policy, its decision
    /// record, any state changes, and the inbox flip commit atomically;
    /// a policy error fails the row instead.
    fn process_row(&self, row: &InboxRow) {
        let Some(policy) = self.router.route(&row.event_type) else {
            tracing::debug!(event = %row.event_id, event_type = %row.event_type, "no policy registered");
            let now = self.clock.now_iso();
            if let Err(e) = self.store.with_transaction(|tx| {
                tx.mark_inbox_status(&row.event_id, InboxStatus::Completed, Some(&now))
            }) {
                tracing::error!(event = %row.event_id, error = %e, "inbox completion failed");
            }
            return;
        };

        let now_iso = self.clock.now_iso();
        let now_ms = self.clock.epoch_ms();
        let outcome: Result<PolicyVerdict, EngineError> = self.store.with_transaction(|tx| {
            let ctx = PolicyCtx {
                tx,
                now_iso: now_iso.clone(),
                now_ms,
            };
            let decision = policy.evaluate(&ctx, row)?;

            self.apply_decision(tx, row, &decision, &now_iso, now_ms)?;

            let max_severity = decision
                .max_severity()
                .map(|s| s.to_string().to_uppercase());
            let record = self.recorder.record_in_tx(
                tx,
                DecisionType::Policy,
                &row.task_id,
                serde_json::json!({
                    "event_id": row.event_id,
                    "event_type": row.event_type,
                    "source": row.source.as_str(),
                    "payload": row.payload,
                }),
                serde_json::json!({
                    "verdict": decision.verdict.as_str(),
                    "reason": decision.reason,
                    "findings": decision.findings.len(),
                    "max_risk_level": max_severity,
                }),
                decision.confidence,
            )?;

            tx.append_audit(&AuditEntry {
                task_id: TaskId::new(&row.task_id),
                ts: now_iso.clone(),
                level: AuditLevel::Info,
                event_type: "supervisor_decision".to_string(),
                payload: serde_json::json!({
                    "policy": policy.name(),
                    "event_id": row.event_id,
                    "verdict": decision.verdict.as_str(),
                    "reason": decision.reason,
                    "decision_id": record.decision_id,
                }),
            })?;

            tx.mark_inbox_status(&row.event_id, InboxStatus::Completed, Some(&now_iso))?;
            Ok(decision.verdict)
        });

        match outcome {
            Ok(verdict) => {
                tracing::debug!(event = %row.event_id, %verdict, "inbox row processed");
            }
            Err(e) => {
                tracing::error!(event = %row.event_id, error = %e, "policy evaluation failed");
                let result = self.store.with_transaction(|tx| {
                    tx.mark_inbox_status(&row.event_id, InboxStatus::Failed, Some(&now_iso))
                });
                if let Err(mark_err) = result {
                    tracing::error!(event = %row.event_id, error = %mark_err, "failed to fail inbox row");
                }
            }
        }
    }

    /// Apply the decision's side effects in the same transaction.
    fn apply_decision(
        &self,
        tx: &fm_storage::StoreTx<'_>,
        row: &InboxRow,
        decision: &PolicyDecision,
        now_iso: &str,
        now_ms: u64,
    ) -> Result<(), fm_storage::StoreError> {
        match decision.verdict {
            PolicyVerdict::Allow | PolicyVerdict::Retry => {}
            PolicyVerdict::Block => {
                match tx.update_task_status(&row.task_id, TaskStatus::Blocked, now_ms) {
                    Ok(_) => {}
                    Err(fm_storage::StoreError::IllegalTransition { .. })
                    | Err(fm_storage::StoreError::NotFound(_)) => {
                        tracing::warn!(task = %row.task_id, "block requested on non-blockable task");
                    }
                    Err(e) => return Err(e),
                }
            }
            PolicyVerdict::Pause => {
                if let Some(task) = tx.get_task(&row.task_id)? {
                    if !task.is_terminal() {
                        let mut metadata = task.metadata.clone();
                        metadata.pause =
                            PauseMetadata::awaiting(PauseCheckpoint::OpenPlan, &decision.reason);
                        tx.set_task_metadata(&row.task_id, &metadata, now_ms)?;
                    }
                }
            }
            PolicyVerdict::RequireReview => {
                tx.append_audit(&AuditEntry {
                    task_id: TaskId::new(&row.task_id),
                    ts: now_iso.to_string(),
                    level: AuditLevel::Warn,
                    event_type: "guardian_assigned".to_string(),
                    payload: serde_json::json!({"reason": decision.reason}),
                })?;
                match tx.update_task_status(&row.task_id, TaskStatus::Verifying, now_ms) {
                    Ok(_) => {}
                    Err(fm_storage::StoreError::IllegalTransition { .. })
                    | Err(fm_storage::StoreError::NotFound(_)) => {
                        tracing::warn!(task = %row.task_id, "verifying transition unavailable");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    /// Start the main loop. Returns a handle that stops it.
    pub fn spawn(self: Arc<Self>) -> SupervisorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let supervisor = Arc::clone(&self);
        let join = tokio::spawn(async move {
            let mut ticks: u32 = 0;
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                if let Err(e) = supervisor.process_available() {
                    tracing::error!(error = %e, "inbox drain failed");
                }

                // Backpressure: a deep pending backlog slows polling.
                let poll_interval = match supervisor.backlog() {
                    Ok(metrics) if metrics.pending > supervisor.config.backpressure_threshold => {
                        let level = supervisor
                            .backpressure_level
                            .fetch_add(1, Ordering::SeqCst)
                            .min(3)
                            + 1;
                        let slowed = supervisor.config.poll_interval * 2u32.pow(level.min(3));
                        tracing::warn!(
                            pending = metrics.pending,
                            ?slowed,
                            "backlog over threshold, slowing poll"
                        );
                        slowed
                    }
                    _ => {
                        supervisor.backpressure_level.store(0, Ordering::SeqCst);
                        supervisor.config.poll_interval
                    }
                };

                tokio::select! {
                    _ = supervisor.notify.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {
                        ticks = ticks.wrapping_add(1);
                        if let Err(e) = supervisor.poll_sources() {
                            tracing::error!(error = %e, "source poll failed");
                        }
                        if ticks % supervisor.config.cleanup_every.max(1) == 0 {
                            match supervisor.cleanup() {
                                Ok(0) => {}
                                Ok(purged) => tracing::info!(purged, "inbox cleanup"),
                                Err(e) => tracing::error!(error = %e, "inbox cleanup failed"),
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {}
                }
            }
            tracing::info!("supervisor stopped");
        });
        SupervisorHandle {
            shutdown: shutdown_tx,
            join,
        }
    }
}

/// Handle to a running supervisor loop.
pub struct SupervisorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SupervisorHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
