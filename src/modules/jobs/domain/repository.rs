/// Storage traits for the job queue and the status audit log
///
/// Both are injected into the worker, scheduler, and maintenance runner.
/// Postgres-backed implementations survive restarts; the in-memory ones are
/// for tests and embedded use.
use crate::modules::jobs::domain::entities::{Job, JobStatus, JobStatusRecord, StatusUpdate};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Priority-ordered pending jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a job, keeping (priority, created_at) order
    async fn enqueue(&self, job: Job) -> AppResult<Uuid>;

    /// Atomically remove and return up to `max_count` jobs from the front.
    /// Two concurrent callers never receive the same job.
    async fn dequeue_batch(&self, max_count: usize) -> AppResult<Vec<Job>>;

    async fn size(&self) -> AppResult<usize>;

    /// Whether the job is still waiting in the queue
    async fn contains(&self, job_id: Uuid) -> AppResult<bool>;

    async fn statistics(&self) -> AppResult<QueueStatistics>;

    /// Drop every pending job, returning how many were removed
    async fn clear(&self) -> AppResult<usize>;
}

/// Lifecycle records keyed by job id
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Record a freshly enqueued job as `Queued`, keeping its snapshot
    async fn create(&self, job: &Job) -> AppResult<JobStatusRecord>;

    /// Validated, atomic status change; `InvalidTransition` leaves the record untouched
    async fn transition(
        &self,
        job_id: Uuid,
        status: JobStatus,
        update: StatusUpdate,
    ) -> AppResult<JobStatusRecord>;

    /// `NotFound` if the id is unknown
    async fn get(&self, job_id: Uuid) -> AppResult<JobStatusRecord>;

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobStatusRecord>>;

    /// Remove terminal records last updated more than `age` ago
    async fn delete_older_than(&self, age: Duration) -> AppResult<usize>;

    async fn counts(&self) -> AppResult<StatusCounts>;

    /// Best-effort storage optimisation
    async fn compact(&self) -> AppResult<()>;
}

/// Queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatistics {
    pub total_queued: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<i32, usize>,
    pub oldest_job: Option<DateTime<Utc>>,
    pub newest_job: Option<DateTime<Utc>>,
}

impl QueueStatistics {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut stats = QueueStatistics::default();
        for job in jobs {
            stats.total_queued += 1;
            *stats.by_type.entry(job.job_type().to_string()).or_insert(0) += 1;
            *stats.by_priority.entry(job.priority()).or_insert(0) += 1;

            let created = job.created_at();
            stats.oldest_job = Some(stats.oldest_job.map_or(created, |t| t.min(created)));
            stats.newest_job = Some(stats.newest_job.map_or(created, |t| t.max(created)));
        }
        stats
    }
}

/// Number of status records per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus, count: usize) {
        match status {
            JobStatus::Queued => self.queued += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }

    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::domain::entities::{SyncOptions, TargetRef};

    #[test]
    fn test_statistics_from_jobs() {
        let a = Job::sync(TargetRef::movie(1), SyncOptions::full(), 5).unwrap();
        let b = Job::sync(TargetRef::tv(2), SyncOptions::full(), 5).unwrap();
        let c = Job::cleanup(20);

        let stats = QueueStatistics::from_jobs([&a, &b, &c]);

        assert_eq!(stats.total_queued, 3);
        assert_eq!(stats.by_type.get("sync"), Some(&2));
        assert_eq!(stats.by_type.get("cleanup"), Some(&1));
        assert_eq!(stats.by_priority.get(&5), Some(&2));
        assert_eq!(stats.oldest_job, Some(a.created_at()));
        assert_eq!(stats.newest_job, Some(c.created_at()));
    }

    #[test]
    fn test_empty_statistics() {
        let stats = QueueStatistics::from_jobs(std::iter::empty());
        assert_eq!(stats.total_queued, 0);
        assert!(stats.oldest_job.is_none());
    }

    #[test]
    fn test_status_counts_total() {
        let mut counts = StatusCounts::default();
        counts.add(JobStatus::Completed, 3);
        counts.add(JobStatus::Failed, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.completed, 3);
    }
}
