// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

use crate::artifacts::ArtifactStore;
use crate::bus::EventBus;
use crate::pipeline::fake::FakePipeline;
use crate::runner::{RunnerConfig, TaskRunner};
use fm_adapters::AdapterRegistry;
use fm_core::{Clock, FakeClock, RunMode, SequentialIdGen, Task, TaskId};
use fm_storage::Store;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Store,
    pub clock: FakeClock,
    pub bus: Arc<EventBus>,
    pub pipeline: Arc<FakePipeline>,
    pub registry: AdapterRegistry,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(&dir.path().join("foreman.db")).expect("store");
        Self {
            dir,
            store,
            clock: FakeClock::new(),
            bus: Arc::new(EventBus::new()),
            pipeline: Arc::new(FakePipeline::new()),
            registry: AdapterRegistry::new(),
        }
    }

    pub fn artifacts_root(&self) -> std::path::PathBuf {
        self.dir.path().join("artifacts")
    }

    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(self.artifacts_root())
    }

    pub fn runner(&self) -> TaskRunner<FakeClock, SequentialIdGen> {
        self.runner_with(|_| {})
    }

    pub fn runner_with(
        &self,
        tune: impl FnOnce(&mut RunnerConfig),
    ) -> TaskRunner<FakeClock, SequentialIdGen> {
        let mut config = RunnerConfig::new(self.artifacts_root(), self.dir.path().to_path_buf());
        config.iteration_sleep = Duration::from_millis(1);
        tune(&mut config);
        TaskRunner::new(
            self.store.clone(),
            Arc::clone(&self.bus),
            self.clock.clone(),
            SequentialIdGen::new("id"),
            self.pipeline.clone(),
            self.registry.clone(),
            config,
        )
    }

    pub fn create_task(&self, id: &str, run_mode: RunMode) -> Task {
        self.store
            .create_task(
                &TaskId::new(id),
                &format!("task {id}"),
                run_mode,
                self.clock.epoch_ms(),
            )
            .expect("create task")
    }
}
