// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use fm_core::{Clock, FakeClock};

fn manager(worker: &str) -> (tempfile::TempDir, Store, LeaseManager<FakeClock>, FakeClock) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("foreman.db")).unwrap();
    let clock = FakeClock::new();
    let manager = LeaseManager::new(store.clone(), clock.clone(), worker, 30_000)
        .with_heartbeat_interval(Duration::from_millis(20));
    (dir, store, manager, clock)
}

#[tokio::test]
async fn acquire_then_release() {
    let (_dir, store, manager, _clock) = manager("worker-a");
    let lease = manager.acquire("wi-1").unwrap().unwrap();
    assert_eq!(lease.work_item_id(), "wi-1");
    assert!(store.get_lease("wi-1").unwrap().is_some());

    lease.release(true).unwrap();
    assert!(store.get_lease("wi-1").unwrap().is_none());
}

#[tokio::test]
async fn contended_acquire_returns_none() {
    let (_dir, store, manager_a, clock) = manager("worker-a");
    let manager_b = LeaseManager::new(store.clone(), clock.clone(), "worker-b", 30_000);

    let _held = manager_a.acquire("wi-1").unwrap().unwrap();
    assert!(manager_b.acquire("wi-1").unwrap().is_none());
}

#[tokio::test]
async fn heartbeat_extends_the_lease() {
    let (_dir, store, manager, clock) = manager("worker-a");
    let _held = manager.acquire("wi-1").unwrap().unwrap();
    let before = store.get_lease("wi-1").unwrap().unwrap();

    // Advance the clock and give the background heartbeat a few beats.
    clock.advance(Duration::from_millis(5_000));
    tokio::time::sleep(Duration::from_millis(80)).await;

    let after = store.get_lease("wi-1").unwrap().unwrap();
    assert!(after.heartbeat_at_ms > before.heartbeat_at_ms);
    assert!(after.expires_at_ms > before.expires_at_ms);
}

#[tokio::test]
async fn reap_abandoned_clears_stale_rows() {
    let (_dir, store, manager, clock) = manager("worker-a");
    // Acquire without heartbeats by releasing the handle immediately
    // (drop aborts the heartbeat but keeps the row).
    let held = manager.acquire("wi-1").unwrap().unwrap();
    drop(held);

    clock.advance(Duration::from_millis(60_000));
    let reaped = manager.reap_abandoned().unwrap();
    assert_eq!(reaped, 1);
    assert!(store.get_lease("wi-1").unwrap().is_none());
}

#[tokio::test]
async fn expired_lease_is_reacquirable() {
    let (_dir, store, manager_a, clock) = manager("worker-a");
    let held = manager_a.acquire("wi-1").unwrap().unwrap();
    drop(held);

    clock.advance(Duration::from_millis(31_000));
    let manager_b = LeaseManager::new(store, clock.clone(), "worker-b", 30_000);
    let taken = manager_b.acquire("wi-1").unwrap();
    assert!(taken.is_some());
}
