/// Test helper functions, mocks and service builders
use async_trait::async_trait;
use mockall::mock;
use reelsync_lib::modules::jobs::application::{ContentSource, SyncExecutor, SyncService};
use reelsync_lib::modules::jobs::domain::{Job, JobQueue, StatusStore, TargetRef};
use reelsync_lib::modules::jobs::infrastructure::{InMemoryJobQueue, InMemoryStatusStore};
use reelsync_lib::modules::jobs::worker::{BackgroundWorker, WorkerSettings};
use reelsync_lib::shared::errors::{AppError, AppResult};
use reelsync_lib::shared::utils::logger::init_logger;
use reelsync_lib::shared::utils::{Clock, ManualClock, RateLimiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::factories::epoch;

mock! {
    pub Executor {}

    #[async_trait]
    impl SyncExecutor for Executor {
        async fn execute(&self, job: &Job) -> AppResult<()>;
    }
}

mock! {
    pub Source {}

    #[async_trait]
    impl ContentSource for Source {
        async fn find_stale(&self, window: Duration) -> AppResult<Vec<TargetRef>>;
        async fn find_missing_images(&self) -> AppResult<Vec<TargetRef>>;
        async fn find_recently_modified(&self, window: Duration) -> AppResult<Vec<TargetRef>>;
        async fn top_by_popularity(&self, n: usize) -> AppResult<Vec<TargetRef>>;
        async fn remove_orphans(&self) -> AppResult<usize>;
        async fn compact(&self) -> AppResult<()>;
    }
}

/// What the scripted executor does for a given target
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(String),
    Panic,
    Hang(Duration),
}

/// Executor whose outcome is scripted per target entity id. Records the
/// order in which jobs reached it.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: HashMap<i64, Behavior>,
    calls: Mutex<Vec<Option<TargetRef>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, entity_id: i64, behavior: Behavior) -> Self {
        self.script.insert(entity_id, behavior);
        self
    }

    pub fn calls(&self) -> Vec<Option<TargetRef>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncExecutor for ScriptedExecutor {
    async fn execute(&self, job: &Job) -> AppResult<()> {
        self.calls.lock().unwrap().push(job.target());

        let behavior = job
            .target()
            .and_then(|target| self.script.get(&target.entity_id).cloned())
            .unwrap_or(Behavior::Succeed);

        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail(message) => Err(AppError::ExternalServiceError(message)),
            Behavior::Panic => panic!("executor blew up"),
            Behavior::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

/// In-memory stores, a manual clock and the operator service over them
pub struct TestContext {
    pub clock: ManualClock,
    pub queue: Arc<InMemoryJobQueue>,
    pub status_store: Arc<InMemoryStatusStore>,
    pub service: Arc<SyncService>,
}

impl TestContext {
    pub fn new() -> Self {
        init_logger();

        let clock = ManualClock::new(epoch());
        let clock_handle: Arc<dyn Clock> = Arc::new(clock.clone());
        let queue = Arc::new(InMemoryJobQueue::new());
        let status_store = Arc::new(InMemoryStatusStore::new(Arc::clone(&clock_handle)));
        let service = Arc::new(SyncService::new(
            queue.clone() as Arc<dyn JobQueue>,
            status_store.clone() as Arc<dyn StatusStore>,
            clock_handle,
        ));

        Self {
            clock,
            queue,
            status_store,
            service,
        }
    }

    pub fn clock_handle(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }

    /// Worker over this context's stores, with the given executor
    pub fn worker(
        &self,
        executor: Arc<dyn SyncExecutor>,
        settings: WorkerSettings,
    ) -> BackgroundWorker {
        BackgroundWorker::new(
            self.queue.clone(),
            self.status_store.clone(),
            executor,
            Arc::new(RateLimiter::new(100)),
            settings,
        )
    }
}

/// No cooldown and a short timeout, so worker tests stay fast
pub fn fast_settings() -> WorkerSettings {
    WorkerSettings {
        max_batch: 10,
        job_cooldown: Duration::ZERO,
        executor_timeout: Duration::from_secs(2),
    }
}
