// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease manager: work-item ownership with background heartbeats.

use fm_core::Clock;
use fm_storage::{Store, StoreError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Manages leases for one worker identity.
#[derive(Clone)]
pub struct LeaseManager<C: Clock> {
    store: Store,
    clock: C,
    worker_id: String,
    ttl_ms: u64,
    heartbeat_interval: Duration,
}

/// A held lease. Heartbeats run in the background until release or drop.
pub struct HeldLease {
    work_item_id: String,
    worker_id: String,
    store: Store,
    heartbeat: Option<JoinHandle<()>>,
}

impl<C: Clock> LeaseManager<C> {
    pub fn new(store: Store, clock: C, worker_id: impl Into<String>, ttl_ms: u64) -> Self {
        // Heartbeat at a third of the TTL so one missed beat is survivable.
        let heartbeat_interval = Duration::from_millis((ttl_ms / 3).max(100));
        Self {
            store,
            clock,
            worker_id: worker_id.into(),
            ttl_ms,
            heartbeat_interval,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Try to acquire the work item's lease. `None` means another live
    /// worker holds it; the caller retries or requeues, never blocks.
    pub fn acquire(&self, work_item_id: &str) -> Result<Option<HeldLease>, StoreError> {
        let now_ms = self.clock.epoch_ms();
        let Some(lease) =
            self.store
                .acquire_lease(work_item_id, &self.worker_id, self.ttl_ms, now_ms)?
        else {
            tracing::debug!(work_item = work_item_id, "lease contended");
            return Ok(None);
        };
        tracing::debug!(
            work_item = work_item_id,
            worker = %self.worker_id,
            expires_at_ms = lease.expires_at_ms,
            "lease acquired"
        );

        let heartbeat = {
            let store = self.store.clone();
            let clock = self.clock.clone();
            let work_item = work_item_id.to_string();
            let worker = self.worker_id.clone();
            let ttl_ms = self.ttl_ms;
            let interval = self.heartbeat_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                ticker.tick().await; // immediate first tick
                loop {
                    ticker.tick().await;
                    match store.heartbeat_lease(&work_item, &worker, ttl_ms, clock.epoch_ms()) {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::warn!(
                                work_item = %work_item,
                                worker = %worker,
                                "lease lost, stopping heartbeat"
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(work_item = %work_item, error = %e, "heartbeat failed");
                        }
                    }
                }
            })
        };

        Ok(Some(HeldLease {
            work_item_id: work_item_id.to_string(),
            worker_id: self.worker_id.clone(),
            store: self.store.clone(),
            heartbeat: Some(heartbeat),
        }))
    }

    /// Drop every lease whose heartbeat has gone stale.
    pub fn reap_abandoned(&self) -> Result<usize, StoreError> {
        let reaped = self.store.reap_expired_leases(self.clock.epoch_ms())?;
        if reaped > 0 {
            tracing::info!(reaped, "abandoned leases reaped");
        }
        Ok(reaped)
    }
}

impl HeldLease {
    pub fn work_item_id(&self) -> &str {
        &self.work_item_id
    }

    /// Release the lease, recording the outcome.
    pub fn release(mut self, success: bool) -> Result<(), StoreError> {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        let released = self.store.release_lease(&self.work_item_id, &self.worker_id)?;
        tracing::debug!(
            work_item = %self.work_item_id,
            success,
            released,
            "lease released"
        );
        Ok(())
    }
}

impl Drop for HeldLease {
    fn drop(&mut self) {
        // Heartbeat timers always stop on the exit path; the row itself is
        // reclaimed by TTL if release was skipped.
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
