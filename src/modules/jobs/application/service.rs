/// Operator-facing sync service
///
/// Owns the "enqueue" path (status record first, then the queue entry) and the
/// out-of-band operator actions: restarting failed jobs, clearing the queue,
/// introspection, and reclaiming jobs abandoned in `Processing` or left
/// `Queued` with no queue entry.
use crate::modules::jobs::domain::{
    Job, JobQueue, JobSpec, JobStatus, JobStatusRecord, QueueStatistics, StatusCounts,
    StatusStore, StatusUpdate,
};
use crate::shared::errors::{AppError, AppResult, JobError};
use crate::shared::utils::clock::Clock;
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_info, log_warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct SyncService {
    queue: Arc<dyn JobQueue>,
    status_store: Arc<dyn StatusStore>,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        status_store: Arc<dyn StatusStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            status_store,
            clock,
        }
    }

    /// Record the job as queued, then make it visible to workers
    pub async fn enqueue(&self, job: Job) -> AppResult<Uuid> {
        // Status first: a worker must never dequeue a job it cannot track.
        self.status_store.create(&job).await?;
        let job_id = self.queue.enqueue(job).await?;
        log_debug!("Enqueued job {}", job_id);
        Ok(job_id)
    }

    /// Stamp a job spec with the current time and enqueue it
    pub async fn enqueue_spec(&self, spec: JobSpec) -> AppResult<Uuid> {
        let job = spec.into_job(self.clock.now())?;
        self.enqueue(job).await
    }

    /// Re-enqueue every failed job from its stored snapshot. The failed
    /// records themselves are left as they are.
    pub async fn restart_failed_jobs(&self) -> AppResult<usize> {
        let failed = self.status_store.list_by_status(JobStatus::Failed).await?;
        let mut restarted = 0;

        for record in failed {
            let job = record.job_snapshot.restart(self.clock.now());
            match self.enqueue(job).await {
                Ok(new_id) => {
                    log_debug!("Restarted failed job {} as {}", record.job_id, new_id);
                    restarted += 1;
                }
                Err(e) => LogContext::error_with_context(
                    &e,
                    &format!("Failed to restart job {}", record.job_id),
                ),
            }
        }

        log_info!("Restarted {} failed jobs", restarted);
        Ok(restarted)
    }

    /// Drop every pending job. Their status records are closed as `Failed`
    /// so nothing is left `Queued` without a queue entry.
    pub async fn clear_queue(&self) -> AppResult<usize> {
        let removed = self.queue.clear().await?;
        log_warn!("Sync queue cleared by operator ({} jobs removed)", removed);

        let closed = self.recover_orphaned_jobs(Duration::ZERO).await?;
        log_debug!("Closed {} status records of cleared jobs", closed);
        Ok(removed)
    }

    pub async fn queue_statistics(&self) -> AppResult<QueueStatistics> {
        self.queue.statistics().await
    }

    pub async fn queue_size(&self) -> AppResult<usize> {
        self.queue.size().await
    }

    pub async fn job_status(&self, job_id: Uuid) -> AppResult<JobStatusRecord> {
        self.status_store.get(job_id).await
    }

    pub async fn jobs_by_status(&self, status: JobStatus) -> AppResult<Vec<JobStatusRecord>> {
        self.status_store.list_by_status(status).await
    }

    pub async fn status_counts(&self) -> AppResult<StatusCounts> {
        self.status_store.counts().await
    }

    /// Fail every job that has sat in `Processing` longer than `timeout`,
    /// which only happens when a worker died mid-job, along with jobs queued
    /// longer than `timeout` ago that are no longer in the queue. The failed
    /// records can then be restarted like any other failure.
    pub async fn recover_stalled_jobs(&self, timeout: Duration) -> AppResult<usize> {
        let cutoff = self.cutoff(timeout)?;

        let processing = self
            .status_store
            .list_by_status(JobStatus::Processing)
            .await?;
        let mut recovered = 0;

        for record in processing {
            let stalled = record.started_at.map_or(true, |started| started < cutoff);
            if !stalled {
                continue;
            }

            let error = JobError::new(format!(
                "stalled in processing for more than {}s",
                timeout.as_secs()
            ));
            match self
                .status_store
                .transition(record.job_id, JobStatus::Failed, StatusUpdate::failed(None, error))
                .await
            {
                Ok(_) => {
                    log_warn!("Job {} was stalled in processing; marked failed", record.job_id);
                    recovered += 1;
                }
                // The worker finished it between our read and write.
                Err(AppError::InvalidTransition { .. }) => {}
                Err(e) => LogContext::error_with_context(
                    &e,
                    &format!("Failed to recover stalled job {}", record.job_id),
                ),
            }
        }

        let orphaned = self.recover_orphaned_jobs(timeout).await?;
        Ok(recovered + orphaned)
    }

    /// Close `Queued` records older than `grace` whose job has left the queue
    /// without reaching a worker: the queue was cleared, a dequeued batch was
    /// abandoned, or the process died between the status write and the queue
    /// insert. The record walks Processing then Failed, so the lifecycle stays
    /// monotonic; losing the race to a worker leaves the record to it.
    pub async fn recover_orphaned_jobs(&self, grace: Duration) -> AppResult<usize> {
        let cutoff = self.cutoff(grace)?;
        let queued = self.status_store.list_by_status(JobStatus::Queued).await?;
        let mut closed = 0;

        for record in queued {
            if record.queued_at > cutoff || self.queue.contains(record.job_id).await? {
                continue;
            }

            match self
                .status_store
                .transition(record.job_id, JobStatus::Processing, StatusUpdate::default())
                .await
            {
                Ok(_) => {}
                // A worker got to it first.
                Err(AppError::InvalidTransition { .. }) => continue,
                Err(e) => {
                    LogContext::error_with_context(
                        &e,
                        &format!("Failed to reclaim orphaned job {}", record.job_id),
                    );
                    continue;
                }
            }

            let error = JobError::new("removed from the queue before dispatch");
            self.status_store
                .transition(record.job_id, JobStatus::Failed, StatusUpdate::failed(None, error))
                .await?;
            log_warn!("Job {} left the queue undispatched; marked failed", record.job_id);
            closed += 1;
        }

        Ok(closed)
    }

    fn cutoff(&self, age: Duration) -> AppResult<chrono::DateTime<chrono::Utc>> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| AppError::ValidationError(format!("Duration too large: {}", e)))?;
        Ok(self.clock.now() - age)
    }
}
