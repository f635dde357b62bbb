/// Test data factories using builder pattern
///
/// Provides convenient methods to create jobs with sensible defaults
use chrono::{DateTime, TimeZone, Utc};
use reelsync_lib::modules::jobs::domain::{Job, JobType, SyncOptions, TargetRef};

/// Fixed instant used as "now" across tests
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

pub struct JobFactory {
    job_type: JobType,
    target: Option<TargetRef>,
    options: SyncOptions,
    priority: i32,
    created_at: DateTime<Utc>,
}

impl Default for JobFactory {
    fn default() -> Self {
        Self {
            job_type: JobType::Sync,
            target: Some(TargetRef::movie(603)),
            options: SyncOptions::full(),
            priority: 10,
            created_at: epoch(),
        }
    }
}

impl JobFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sync job for a movie
    pub fn movie(entity_id: i64) -> Self {
        Self {
            target: Some(TargetRef::movie(entity_id)),
            ..Self::default()
        }
    }

    pub fn tv(entity_id: i64) -> Self {
        Self {
            target: Some(TargetRef::tv(entity_id)),
            ..Self::default()
        }
    }

    pub fn cleanup() -> Self {
        Self {
            job_type: JobType::Cleanup,
            target: None,
            options: SyncOptions::none(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Created `seconds` after the epoch
    pub fn created_after(mut self, seconds: i64) -> Self {
        self.created_at = epoch() + chrono::Duration::seconds(seconds);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn build(self) -> Job {
        Job::new(
            self.job_type,
            self.target,
            self.options,
            self.priority,
            self.created_at,
        )
        .expect("factory produced an invalid job")
    }
}
