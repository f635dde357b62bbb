/// Daily housekeeping for the sync engine
///
/// Steps run in a fixed order and each one is best-effort: a failure is
/// logged and written into the report, then the next step runs anyway.
use crate::modules::jobs::application::{Cache, ContentSource, SyncService};
use crate::modules::jobs::domain::StatusStore;
use crate::shared::config::SyncConfig;
use crate::shared::errors::AppResult;
use crate::shared::utils::logger::{LogContext, TimedOperation};
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Result of a single maintenance step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Completed(usize),
    Failed(String),
}

impl StepOutcome {
    pub fn count(&self) -> Option<usize> {
        match self {
            StepOutcome::Completed(count) => Some(*count),
            StepOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub cache_purged: StepOutcome,
    pub statuses_deleted: StepOutcome,
    pub orphans_removed: StepOutcome,
    pub stalled_recovered: StepOutcome,
    /// Number of stores compacted
    pub compacted: StepOutcome,
    pub duration: Duration,
}

impl MaintenanceReport {
    pub fn has_failures(&self) -> bool {
        [
            &self.cache_purged,
            &self.statuses_deleted,
            &self.orphans_removed,
            &self.stalled_recovered,
            &self.compacted,
        ]
        .iter()
        .any(|step| step.is_failed())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceSettings {
    pub status_retention: Duration,
    pub stalled_job_timeout: Duration,
}

impl MaintenanceSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            status_retention: config.status_retention,
            stalled_job_timeout: config.stalled_job_timeout,
        }
    }
}

pub struct MaintenanceRunner {
    service: Arc<SyncService>,
    status_store: Arc<dyn StatusStore>,
    source: Arc<dyn ContentSource>,
    cache: Arc<dyn Cache>,
    settings: MaintenanceSettings,
}

impl MaintenanceRunner {
    pub fn new(
        service: Arc<SyncService>,
        status_store: Arc<dyn StatusStore>,
        source: Arc<dyn ContentSource>,
        cache: Arc<dyn Cache>,
        settings: MaintenanceSettings,
    ) -> Self {
        Self {
            service,
            status_store,
            source,
            cache,
            settings,
        }
    }

    pub async fn run(&self) -> MaintenanceReport {
        let started = Instant::now();
        log_info!("Starting sync maintenance");

        let cache_purged = step("cache purge", self.cache.purge_expired()).await;
        let statuses_deleted = step(
            "status retention",
            self.status_store
                .delete_older_than(self.settings.status_retention),
        )
        .await;
        let orphans_removed = step("orphan cleanup", self.source.remove_orphans()).await;
        let stalled_recovered = step(
            "stalled job recovery",
            self.service
                .recover_stalled_jobs(self.settings.stalled_job_timeout),
        )
        .await;
        let compacted = step("storage compaction", self.compact()).await;

        let report = MaintenanceReport {
            cache_purged,
            statuses_deleted,
            orphans_removed,
            stalled_recovered,
            compacted,
            duration: started.elapsed(),
        };

        if report.has_failures() {
            log_warn!("Sync maintenance finished with failures: {:?}", report);
        } else {
            log_info!("Sync maintenance finished in {:?}", report.duration);
        }
        report
    }

    /// Compact the status store, then the content storage. Both are tried even
    /// if the first fails.
    async fn compact(&self) -> AppResult<usize> {
        let status = self.status_store.compact().await;
        let content = self.source.compact().await;

        status?;
        content?;
        Ok(2)
    }

    /// Run maintenance once per `MAINTENANCE_INTERVAL` until cancelled.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }
                self.run().await;
            }

            log_info!("Sync maintenance loop stopped");
        })
    }
}

async fn step<F>(name: &str, operation: F) -> StepOutcome
where
    F: Future<Output = AppResult<usize>>,
{
    let timer = TimedOperation::new(name);
    match operation.await {
        Ok(count) => {
            timer.finish_with_info(&format!("{} affected", count));
            StepOutcome::Completed(count)
        }
        Err(e) => {
            LogContext::error_with_context(&e, &format!("Maintenance step '{}' failed", name));
            StepOutcome::Failed(e.to_string())
        }
    }
}
