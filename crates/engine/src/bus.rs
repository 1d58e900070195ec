// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus.
//!
//! Fire-and-forget broadcast to synchronous and asynchronous subscribers.
//! Subscriber failures are swallowed at the bus boundary: a panicking sync
//! subscriber or a failing async task never reaches the publisher.
//! Delivery to sync subscribers is ordered per emitting task; nothing is
//! guaranteed across emitters.

use fm_core::Event;
use parking_lot::RwLock;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;

/// Future type async subscribers return.
pub type SubscriberFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type SyncSubscriber = Arc<dyn Fn(&Event) + Send + Sync>;
type AsyncSubscriber = Arc<dyn Fn(Event) -> SubscriberFuture + Send + Sync>;

/// Process-local broadcaster. Never shared across processes.
#[derive(Default)]
pub struct EventBus {
    sync_subscribers: RwLock<Vec<SyncSubscriber>>,
    async_subscribers: RwLock<Vec<AsyncSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous callback. Re-entrant emission from inside a
    /// callback is allowed (the subscriber list is cloned before
    /// delivery).
    pub fn subscribe(&self, callback: impl Fn(&Event) + Send + Sync + 'static) {
        self.sync_subscribers.write().push(Arc::new(callback));
    }

    /// Register an asynchronous callback. Delivery is scheduled on the
    /// runtime; `emit` never awaits it.
    pub fn subscribe_async<F, Fut>(&self, callback: F)
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let wrapped: AsyncSubscriber = Arc::new(move |event| Box::pin(callback(event)));
        self.async_subscribers.write().push(wrapped);
    }

    /// Fire-and-forget emission.
    pub fn emit(&self, event: &Event) {
        tracing::debug!(event = %event.log_summary(), "emit");

        let sync_subscribers: Vec<SyncSubscriber> =
            self.sync_subscribers.read().iter().cloned().collect();
        for subscriber in sync_subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                tracing::error!(event = %event.kind, "sync subscriber panicked");
            }
        }

        let async_subscribers: Vec<AsyncSubscriber> =
            self.async_subscribers.read().iter().cloned().collect();
        if async_subscribers.is_empty() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                for subscriber in async_subscribers {
                    handle.spawn(subscriber(event.clone()));
                }
            }
            Err(_) => {
                tracing::warn!(
                    event = %event.kind,
                    "no runtime available, async subscribers skipped"
                );
            }
        }
    }

    /// Emission that awaits async subscribers.
    pub async fn emit_async(&self, event: &Event) {
        let sync_subscribers: Vec<SyncSubscriber> =
            self.sync_subscribers.read().iter().cloned().collect();
        for subscriber in sync_subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(event))).is_err() {
                tracing::error!(event = %event.kind, "sync subscriber panicked");
            }
        }

        let async_subscribers: Vec<AsyncSubscriber> =
            self.async_subscribers.read().iter().cloned().collect();
        for subscriber in async_subscribers {
            // Spawned so a panicking subscriber aborts its own task, not
            // the publisher; awaited so emit_async observes completion.
            if let Err(e) = tokio::spawn(subscriber(event.clone())).await {
                tracing::error!(event = %event.kind, error = %e, "async subscriber failed");
            }
        }
    }

    /// Total subscriber count, for health reporting.
    pub fn subscriber_count(&self) -> usize {
        self.sync_subscribers.read().len() + self.async_subscribers.read().len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
