//! Sync engine facade.
//!
//! Wires the rate limiter, operator service, worker, scheduler and
//! maintenance runner around a set of injected collaborators, and starts
//! their periodic loops.

use crate::modules::jobs::application::{Cache, ContentSource, SyncExecutor, SyncService};
use crate::modules::jobs::domain::{JobQueue, StatusStore};
use crate::modules::jobs::infrastructure::{PgJobQueue, PgStatusStore};
use crate::modules::jobs::worker::{BackgroundWorker, WorkerSettings};
use crate::modules::maintenance::{MaintenanceRunner, MaintenanceSettings};
use crate::modules::scheduler::{
    PgTriggerStateStore, Scheduler, TriggerStateStore, TICK_INTERVAL,
};
use crate::shared::config::SyncConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::Database;
use crate::shared::utils::clock::Clock;
use crate::shared::utils::rate_limiter::RateLimiter;
use crate::log_info;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything the engine needs from the outside world
pub struct SyncCollaborators {
    pub queue: Arc<dyn JobQueue>,
    pub status_store: Arc<dyn StatusStore>,
    pub trigger_state: Arc<dyn TriggerStateStore>,
    pub executor: Arc<dyn SyncExecutor>,
    pub content_source: Arc<dyn ContentSource>,
    pub cache: Arc<dyn Cache>,
    pub clock: Arc<dyn Clock>,
}

impl SyncCollaborators {
    /// Collaborators backed by the Postgres stores at `config.database_url`.
    /// Runs pending migrations before returning.
    pub fn postgres(
        config: &SyncConfig,
        executor: Arc<dyn SyncExecutor>,
        content_source: Arc<dyn ContentSource>,
        cache: Arc<dyn Cache>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            AppError::ConfigurationError("DATABASE_URL must be set for the Postgres stores".into())
        })?;
        let database = Database::connect(url)?;
        database.run_migrations()?;

        Ok(Self {
            queue: Arc::new(PgJobQueue::new(database.pool().clone())),
            status_store: Arc::new(PgStatusStore::new(
                database.pool().clone(),
                Arc::clone(&clock),
            )),
            trigger_state: Arc::new(PgTriggerStateStore::new(database.pool().clone())),
            executor,
            content_source,
            cache,
            clock,
        })
    }
}

pub struct SyncEngine {
    config: SyncConfig,
    rate_limiter: Arc<RateLimiter>,
    service: Arc<SyncService>,
    worker: Arc<BackgroundWorker>,
    scheduler: Arc<Scheduler>,
    maintenance: Arc<MaintenanceRunner>,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, collaborators: SyncCollaborators) -> AppResult<Self> {
        config.validate()?;

        let SyncCollaborators {
            queue,
            status_store,
            trigger_state,
            executor,
            content_source,
            cache,
            clock,
        } = collaborators;

        let rate_limiter = Arc::new(RateLimiter::new(config.requests_per_second));
        let service = Arc::new(SyncService::new(
            Arc::clone(&queue),
            Arc::clone(&status_store),
            Arc::clone(&clock),
        ));
        let worker = Arc::new(BackgroundWorker::new(
            Arc::clone(&queue),
            Arc::clone(&status_store),
            executor,
            Arc::clone(&rate_limiter),
            WorkerSettings::from_config(&config),
        ));
        let scheduler = Arc::new(Scheduler::new(
            config.clone(),
            Arc::clone(&service),
            Arc::clone(&content_source),
            trigger_state,
            Arc::clone(&clock),
        ));
        let maintenance = Arc::new(MaintenanceRunner::new(
            Arc::clone(&service),
            status_store,
            content_source,
            cache,
            MaintenanceSettings::from_config(&config),
        ));

        Ok(Self {
            config,
            rate_limiter,
            service,
            worker,
            scheduler,
            maintenance,
        })
    }

    /// Register the default triggers. Returns how many were registered.
    pub async fn initialize(&self) -> AppResult<usize> {
        self.scheduler.register_default_triggers().await
    }

    /// Spawn the worker, scheduler and maintenance loops. All three stop once
    /// `cancel` fires; a worker cycle in flight is allowed to finish.
    pub fn start(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        log_info!(
            "Starting sync engine (auto-sync: {}, {} req/s)",
            self.config.auto_sync_enabled,
            self.rate_limiter.requests_per_second()
        );

        vec![
            Arc::clone(&self.worker).start(self.config.worker_interval, cancel.clone()),
            Arc::clone(&self.scheduler).start(TICK_INTERVAL, cancel.clone()),
            Arc::clone(&self.maintenance).start(cancel),
        ]
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    pub fn worker(&self) -> &Arc<BackgroundWorker> {
        &self.worker
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn maintenance(&self) -> &Arc<MaintenanceRunner> {
        &self.maintenance
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}
