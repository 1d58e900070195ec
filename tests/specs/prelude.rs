//! Shared rig for the workspace specs.

use fm_adapters::AdapterRegistry;
use fm_core::{RunMode, SequentialIdGen, SystemClock, Task, TaskId};
use fm_engine::{EventBus, FakePipeline, RunnerConfig, Supervisor, SupervisorConfig, TaskRunner};
use fm_storage::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A full in-process deployment against one temp directory.
pub struct Rig {
    pub dir: tempfile::TempDir,
    pub store: Store,
    pub bus: Arc<EventBus>,
    pub pipeline: Arc<FakePipeline>,
    pub registry: AdapterRegistry,
    pub supervisor: Arc<Supervisor<SystemClock, SequentialIdGen>>,
}

impl Rig {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(&dir.path().join("foreman.db")).expect("store");
        let bus = Arc::new(EventBus::new());
        let supervisor = Arc::new(Supervisor::new(
            store.clone(),
            SystemClock,
            SequentialIdGen::new("dec"),
            SupervisorConfig::default(),
        ));
        supervisor.attach(&bus);
        Self {
            dir,
            store,
            bus,
            pipeline: Arc::new(FakePipeline::new()),
            registry: AdapterRegistry::new(),
            supervisor,
        }
    }

    pub fn artifacts_root(&self) -> PathBuf {
        self.dir.path().join("artifacts")
    }

    pub fn runner(&self) -> TaskRunner<SystemClock, SequentialIdGen> {
        let mut config = RunnerConfig::new(self.artifacts_root(), self.dir.path().to_path_buf());
        config.iteration_sleep = Duration::from_millis(2);
        TaskRunner::new(
            self.store.clone(),
            Arc::clone(&self.bus),
            SystemClock,
            SequentialIdGen::new("run"),
            self.pipeline.clone(),
            self.registry.clone(),
            config,
        )
    }

    pub fn create_task(&self, id: &str, run_mode: RunMode) -> Task {
        let task = self
            .store
            .create_task(&TaskId::new(id), &format!("task {id}"), run_mode, now_ms())
            .expect("create task");
        self.bus.emit(&fm_core::Event::task(
            fm_core::EventKind::TaskCreated,
            id,
            chrono::Utc::now().to_rfc3339(),
            serde_json::Map::new(),
        ));
        task
    }

    /// Poll until the task reaches `status` or the deadline passes.
    pub async fn wait_for_status(&self, task_id: &str, status: fm_core::TaskStatus) -> bool {
        for _ in 0..500 {
            if let Ok(Some(task)) = self.store.get_task(task_id) {
                if task.status == status {
                    return true;
                }
                if task.is_terminal() && task.status != status {
                    return false;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
