//! In-process JobQueue and StatusStore.
//!
//! State lives only as long as the value does, so these suit tests and hosts
//! that embed the engine in one long-running process. Every operation is a
//! single critical section, which gives the same atomicity guarantees as the
//! Postgres stores.
use crate::modules::jobs::domain::entities::{Job, JobStatus, JobStatusRecord, StatusUpdate};
use crate::modules::jobs::domain::repository::{
    JobQueue, QueueStatistics, StatusCounts, StatusStore,
};
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

/// (priority, created_at, insertion sequence)
type QueueKey = (i32, DateTime<Utc>, u64);

#[derive(Default)]
struct QueueState {
    jobs: BTreeMap<QueueKey, Job>,
    next_seq: u64,
}

#[derive(Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| AppError::InternalError("job queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: Job) -> AppResult<Uuid> {
        let mut state = self.lock()?;
        let seq = state.next_seq;
        state.next_seq += 1;

        let id = job.id();
        state
            .jobs
            .insert((job.priority(), job.created_at(), seq), job);
        Ok(id)
    }

    async fn dequeue_batch(&self, max_count: usize) -> AppResult<Vec<Job>> {
        let mut state = self.lock()?;
        let mut batch = Vec::with_capacity(max_count.min(state.jobs.len()));

        while batch.len() < max_count {
            match state.jobs.pop_first() {
                Some((_, job)) => batch.push(job),
                None => break,
            }
        }
        Ok(batch)
    }

    async fn size(&self) -> AppResult<usize> {
        Ok(self.lock()?.jobs.len())
    }

    async fn contains(&self, job_id: Uuid) -> AppResult<bool> {
        Ok(self.lock()?.jobs.values().any(|job| job.id() == job_id))
    }

    async fn statistics(&self) -> AppResult<QueueStatistics> {
        Ok(QueueStatistics::from_jobs(self.lock()?.jobs.values()))
    }

    async fn clear(&self) -> AppResult<usize> {
        let mut state = self.lock()?;
        let removed = state.jobs.len();
        state.jobs.clear();
        Ok(removed)
    }
}

pub struct InMemoryStatusStore {
    records: Mutex<HashMap<Uuid, JobStatusRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStatusStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<Uuid, JobStatusRecord>>> {
        self.records
            .lock()
            .map_err(|_| AppError::InternalError("status store lock poisoned".to_string()))
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn create(&self, job: &Job) -> AppResult<JobStatusRecord> {
        let record = JobStatusRecord::queued(job, self.clock.now());
        let mut records = self.lock()?;

        if records.contains_key(&job.id()) {
            return Err(AppError::ValidationError(format!(
                "Status for job {} already exists",
                job.id()
            )));
        }
        records.insert(job.id(), record.clone());
        Ok(record)
    }

    async fn transition(
        &self,
        job_id: Uuid,
        status: JobStatus,
        update: StatusUpdate,
    ) -> AppResult<JobStatusRecord> {
        let now = self.clock.now();
        let mut records = self.lock()?;

        let record = records
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job status {} not found", job_id)))?;

        if let Err(e) = record.apply(status, update, now) {
            log::error!("Rejected status change: {}", e);
            return Err(e);
        }
        Ok(record.clone())
    }

    async fn get(&self, job_id: Uuid) -> AppResult<JobStatusRecord> {
        self.lock()?
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job status {} not found", job_id)))
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobStatusRecord>> {
        let mut matching: Vec<JobStatusRecord> = self
            .lock()?
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.queued_at);
        Ok(matching)
    }

    async fn delete_older_than(&self, age: Duration) -> AppResult<usize> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| AppError::ValidationError(format!("Retention window too large: {}", e)))?;
        let cutoff = self.clock.now() - age;
        let mut records = self.lock()?;

        let before = records.len();
        records.retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        Ok(before - records.len())
    }

    async fn counts(&self) -> AppResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for record in self.lock()?.values() {
            counts.add(record.status, 1);
        }
        Ok(counts)
    }

    async fn compact(&self) -> AppResult<()> {
        self.lock()?.shrink_to_fit();
        Ok(())
    }
}
