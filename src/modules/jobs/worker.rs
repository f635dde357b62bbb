/// Background worker that drains the sync queue in bounded batches
///
/// Each cycle dequeues at most `max_batch` jobs and runs them one after
/// another: mark Processing, wait for the rate limiter, call the executor
/// (under a timeout, with panics caught), then record Completed or Failed.
/// One job's failure never stops the rest of the batch.
use crate::modules::jobs::application::ports::SyncExecutor;
use crate::modules::jobs::domain::{Job, JobQueue, JobStatus, StatusStore, StatusUpdate};
use crate::shared::config::SyncConfig;
use crate::shared::errors::{AppError, AppResult, JobError};
use crate::shared::utils::logger::TimedOperation;
use crate::shared::utils::rate_limiter::RateLimiter;
use crate::{log_debug, log_error, log_info, log_warn};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Upper bound on jobs taken per cycle
pub const MAX_BATCH: usize = 10;

/// Pacing knobs for the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_batch: usize,
    pub job_cooldown: Duration,
    pub executor_timeout: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_batch: MAX_BATCH,
            job_cooldown: config.job_cooldown,
            executor_timeout: config.executor_timeout,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// How one cycle went
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub dequeued: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs whose status could not be recorded (and so were not run or not closed)
    pub skipped: usize,
    /// Another cycle was already running in this process
    pub overlapped: bool,
    pub duration: Duration,
}

enum JobOutcome {
    Completed,
    Failed,
}

/// Background worker that processes jobs from the queue
pub struct BackgroundWorker {
    queue: Arc<dyn JobQueue>,
    status_store: Arc<dyn StatusStore>,
    executor: Arc<dyn SyncExecutor>,
    rate_limiter: Arc<RateLimiter>,
    settings: WorkerSettings,
    cycle_lock: tokio::sync::Mutex<()>,
    is_running: AtomicBool,
    cycles_run: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
}

impl BackgroundWorker {
    /// Create a new background worker
    pub fn new(
        queue: Arc<dyn JobQueue>,
        status_store: Arc<dyn StatusStore>,
        executor: Arc<dyn SyncExecutor>,
        rate_limiter: Arc<RateLimiter>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            status_store,
            executor,
            rate_limiter,
            settings,
            cycle_lock: tokio::sync::Mutex::new(()),
            is_running: AtomicBool::new(false),
            cycles_run: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
        }
    }

    /// Run one batch. Returns immediately when the queue is empty.
    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        let started = Instant::now();

        let Ok(_cycle) = self.cycle_lock.try_lock() else {
            log_warn!("Worker cycle already in progress; skipping this tick");
            return Ok(CycleReport {
                overlapped: true,
                ..CycleReport::default()
            });
        };

        let batch = self.queue.dequeue_batch(self.settings.max_batch).await?;
        let mut report = CycleReport {
            dequeued: batch.len(),
            ..CycleReport::default()
        };

        if batch.is_empty() {
            log_debug!("Sync queue empty; nothing to do");
            report.duration = started.elapsed();
            return Ok(report);
        }

        let timer = TimedOperation::new("sync worker cycle");
        log_info!("Processing batch of {} sync jobs", batch.len());

        for (index, job) in batch.iter().enumerate() {
            if index > 0 && !self.settings.job_cooldown.is_zero() {
                tokio::time::sleep(self.settings.job_cooldown).await;
            }

            match self.process_job(job).await {
                Ok(JobOutcome::Completed) => report.completed += 1,
                Ok(JobOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    log_error!("Could not record status for job {}: {}", job.id(), e);
                    report.skipped += 1;
                }
            }
        }

        self.cycles_run.fetch_add(1, Ordering::Relaxed);
        self.jobs_completed
            .fetch_add(report.completed as u64, Ordering::Relaxed);
        self.jobs_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        timer.finish_with_info(&format!(
            "{} completed, {} failed, {} skipped",
            report.completed, report.failed, report.skipped
        ));
        report.duration = started.elapsed();
        Ok(report)
    }

    /// Run one job through its lifecycle. An `Err` means the status store
    /// refused a write; executor failures come back as `Ok(Failed)`.
    async fn process_job(&self, job: &Job) -> AppResult<JobOutcome> {
        self.status_store
            .transition(job.id(), JobStatus::Processing, StatusUpdate::default())
            .await?;

        log_debug!(
            "Processing job {} (type: {}, priority: {})",
            job.id(),
            job.job_type(),
            job.priority()
        );

        self.rate_limiter.wait_if_needed().await;

        let started = Instant::now();
        let result = self.execute_isolated(job).await;
        let execution_time = started.elapsed();

        match result {
            Ok(()) => {
                self.status_store
                    .transition(
                        job.id(),
                        JobStatus::Completed,
                        StatusUpdate::completed(execution_time),
                    )
                    .await?;
                log_info!("Job {} completed in {:?}", job.id(), execution_time);
                Ok(JobOutcome::Completed)
            }
            Err(e) => {
                let kind = if e.is_transient() { "transient" } else { "permanent" };
                log_warn!("Job {} failed ({}): {}", job.id(), kind, e);
                self.status_store
                    .transition(
                        job.id(),
                        JobStatus::Failed,
                        StatusUpdate::failed(Some(execution_time), JobError::from(&e)),
                    )
                    .await?;
                Ok(JobOutcome::Failed)
            }
        }
    }

    /// Call the executor so that nothing it does can escape as a panic or
    /// hang past the timeout.
    async fn execute_isolated(&self, job: &Job) -> AppResult<()> {
        let call = AssertUnwindSafe(async { self.executor.execute(job).await }).catch_unwind();

        match tokio::time::timeout(self.settings.executor_timeout, call).await {
            Err(_) => Err(AppError::Timeout(format!(
                "executor did not finish within {:?}",
                self.settings.executor_timeout
            ))),
            Ok(Err(panic)) => Err(AppError::InternalError(format!(
                "executor panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Ok(Ok(result)) => result,
        }
    }

    /// Run a cycle every `interval` until `cancel` fires. A cycle in flight
    /// always finishes; cancellation only stops the next one from starting.
    pub fn start(self: Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.is_running.store(true, Ordering::SeqCst);
            log_info!("Sync worker started (interval: {:?})", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if let Err(e) = self.run_cycle().await {
                    log_error!("Error in worker cycle: {}", e);
                }
            }

            self.is_running.store(false, Ordering::SeqCst);
            log_info!("Sync worker stopped");
        })
    }

    /// Get statistics about the worker and job queue
    pub async fn get_statistics(&self) -> AppResult<WorkerStatistics> {
        Ok(WorkerStatistics {
            is_running: self.is_running.load(Ordering::SeqCst),
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            queued_jobs: self.queue.size().await?,
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Worker statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatistics {
    pub is_running: bool,
    pub cycles_run: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub queued_jobs: usize,
}
