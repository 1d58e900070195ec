// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::test_support::task_event;
use fm_core::EventKind;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn sync_subscribers_receive_in_emit_order() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    bus.subscribe(move |event| {
        seen_clone.lock().push(event.kind.name().to_string());
    });

    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    bus.emit(&task_event(EventKind::TaskProgress, "t-1"));
    bus.emit(&task_event(EventKind::TaskCompleted, "t-1"));

    assert_eq!(
        *seen.lock(),
        vec!["task.created", "task.progress", "task.completed"]
    );
}

#[test]
fn panicking_subscriber_never_reaches_the_publisher() {
    let bus = EventBus::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    bus.subscribe(|_| panic!("subscriber bug"));
    let delivered_clone = Arc::clone(&delivered);
    bus.subscribe(move |_| {
        delivered_clone.fetch_add(1, Ordering::SeqCst);
    });

    // Does not propagate, and later subscribers still run.
    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[test]
fn subscriber_count_includes_both_kinds() {
    let bus = EventBus::new();
    assert_eq!(bus.subscriber_count(), 0);
    bus.subscribe(|_| {});
    bus.subscribe_async(|_| async {});
    assert_eq!(bus.subscriber_count(), 2);
}

#[test]
fn emit_without_runtime_skips_async_subscribers() {
    let bus = EventBus::new();
    bus.subscribe_async(|_| async {});
    // No tokio runtime here; emit must not panic.
    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
}

#[tokio::test]
async fn emit_async_awaits_async_subscribers() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    bus.subscribe_async(move |_| {
        let count = Arc::clone(&count_clone);
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            count.fetch_add(1, Ordering::SeqCst);
        }
    });

    bus.emit_async(&task_event(EventKind::TaskCreated, "t-1")).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fire_and_forget_emit_schedules_async_subscribers() {
    let bus = EventBus::new();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = Arc::clone(&count);
    bus.subscribe_async(move |_| {
        let count = Arc::clone(&count_clone);
        async move {
            count.fetch_add(1, Ordering::SeqCst);
        }
    });

    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    // Scheduled, not awaited: give the runtime a beat.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn reentrant_emit_is_allowed() {
    let bus = Arc::new(EventBus::new());
    let depth = Arc::new(AtomicUsize::new(0));
    let bus_clone = Arc::clone(&bus);
    let depth_clone = Arc::clone(&depth);
    bus.subscribe(move |event| {
        let n = depth_clone.fetch_add(1, Ordering::SeqCst);
        if event.kind == EventKind::TaskCreated && n == 0 {
            bus_clone.emit(&task_event(EventKind::TaskProgress, "t-1"));
        }
    });
    bus.emit(&task_event(EventKind::TaskCreated, "t-1"));
    // Outer + inner delivery both happened.
    assert_eq!(depth.load(Ordering::SeqCst), 2);
}
