/// Domain entities for the synchronization job system
///
/// A job asks the metadata provider to refresh one local entity (or, for
/// cleanup, the provider-side bookkeeping as a whole). Jobs are immutable once
/// built; their lifecycle lives in a separate [`JobStatusRecord`].
use crate::shared::config::SyncConfig;
use crate::shared::errors::{AppError, AppResult, JobError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Job type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Sync,
    ImageSync,
    BulkSync,
    Cleanup,
    UpdatePopularity,
}

impl JobType {
    /// Cleanup works on the whole catalogue; every other type needs a target.
    pub fn requires_target(&self) -> bool {
        !matches!(self, JobType::Cleanup)
    }

    /// Whether `options` fits the flag schema recognized for this job type
    pub fn accepts(&self, options: &SyncOptions) -> bool {
        match self {
            JobType::Sync | JobType::BulkSync => true,
            JobType::ImageSync => *options == SyncOptions::images_only(),
            JobType::Cleanup | JobType::UpdatePopularity => *options == SyncOptions::none(),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Sync => write!(f, "sync"),
            JobType::ImageSync => write!(f, "image_sync"),
            JobType::BulkSync => write!(f, "bulk_sync"),
            JobType::Cleanup => write!(f, "cleanup"),
            JobType::UpdatePopularity => write!(f, "update_popularity"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sync" => Ok(JobType::Sync),
            "image_sync" => Ok(JobType::ImageSync),
            "bulk_sync" => Ok(JobType::BulkSync),
            "cleanup" => Ok(JobType::Cleanup),
            "update_popularity" => Ok(JobType::UpdatePopularity),
            _ => Err(format!("Invalid job type: {}", s)),
        }
    }
}

/// Kind of locally stored content a job points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Movie,
    Tv,
    Drama,
    Person,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Movie => write!(f, "movie"),
            EntityKind::Tv => write!(f, "tv"),
            EntityKind::Drama => write!(f, "drama"),
            EntityKind::Person => write!(f, "person"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" => Ok(EntityKind::Movie),
            "tv" => Ok(EntityKind::Tv),
            "drama" => Ok(EntityKind::Drama),
            "person" => Ok(EntityKind::Person),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

/// Reference to the local entity a job synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub entity_id: i64,
    pub kind: EntityKind,
}

impl TargetRef {
    pub fn new(kind: EntityKind, entity_id: i64) -> Self {
        Self { entity_id, kind }
    }

    pub fn movie(entity_id: i64) -> Self {
        Self::new(EntityKind::Movie, entity_id)
    }

    pub fn tv(entity_id: i64) -> Self {
        Self::new(EntityKind::Tv, entity_id)
    }

    pub fn drama(entity_id: i64) -> Self {
        Self::new(EntityKind::Drama, entity_id)
    }

    pub fn person(entity_id: i64) -> Self {
        Self::new(EntityKind::Person, entity_id)
    }
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.entity_id)
    }
}

/// What a sync job should pull from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub sync_images: bool,
    pub sync_videos: bool,
    pub sync_credits: bool,
}

impl SyncOptions {
    pub fn full() -> Self {
        Self {
            sync_images: true,
            sync_videos: true,
            sync_credits: true,
        }
    }

    pub fn without_images() -> Self {
        Self {
            sync_images: false,
            ..Self::full()
        }
    }

    pub fn images_only() -> Self {
        Self {
            sync_images: true,
            ..Self::none()
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Clear every flag the operator has switched off
    pub fn gated_by(self, config: &SyncConfig) -> Self {
        Self {
            sync_images: self.sync_images && config.sync_images,
            sync_videos: self.sync_videos && config.sync_videos,
            sync_credits: self.sync_credits && config.sync_credits,
        }
    }
}

/// A unit of sync work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredJob")]
pub struct Job {
    id: Uuid,
    job_type: JobType,
    target: Option<TargetRef>,
    options: SyncOptions,
    priority: i32,
    created_at: DateTime<Utc>,
}

/// Wire shape of a job; every read goes back through [`Job::restore`]
#[derive(Deserialize)]
struct StoredJob {
    id: Uuid,
    job_type: JobType,
    target: Option<TargetRef>,
    #[serde(default)]
    options: SyncOptions,
    priority: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredJob> for Job {
    type Error = AppError;

    fn try_from(stored: StoredJob) -> AppResult<Self> {
        Job::restore(
            stored.id,
            stored.job_type,
            stored.target,
            stored.options,
            stored.priority,
            stored.created_at,
        )
    }
}

impl Job {
    /// Build a new job with a fresh id
    pub fn new(
        job_type: JobType,
        target: Option<TargetRef>,
        options: SyncOptions,
        priority: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        Self::restore(
            Uuid::new_v4(),
            job_type,
            target,
            options,
            priority,
            created_at,
        )
    }

    /// Rebuild a job read back from storage, re-checking its shape
    pub fn restore(
        id: Uuid,
        job_type: JobType,
        target: Option<TargetRef>,
        options: SyncOptions,
        priority: i32,
        created_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if job_type.requires_target() && target.is_none() {
            return Err(AppError::ValidationError(format!(
                "{} job requires a target",
                job_type
            )));
        }
        if !job_type.requires_target() && target.is_some() {
            return Err(AppError::ValidationError(format!(
                "{} job does not take a target",
                job_type
            )));
        }
        if !job_type.accepts(&options) {
            return Err(AppError::ValidationError(format!(
                "options {:?} are not valid for {} jobs",
                options, job_type
            )));
        }

        Ok(Self {
            id,
            job_type,
            target,
            options,
            priority,
            created_at,
        })
    }

    /// Create a sync job for a target
    pub fn sync(target: TargetRef, options: SyncOptions, priority: i32) -> AppResult<Self> {
        Self::new(JobType::Sync, Some(target), options, priority, Utc::now())
    }

    /// Create a cleanup job
    pub fn cleanup(priority: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: JobType::Cleanup,
            target: None,
            options: SyncOptions::none(),
            priority,
            created_at: Utc::now(),
        }
    }

    /// A brand-new job carrying the same work as this one
    pub fn restart(&self, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at,
            ..self.clone()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn job_type(&self) -> JobType {
        self.job_type
    }

    pub fn target(&self) -> Option<TargetRef> {
        self.target
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// What a trigger asks to enqueue; becomes a [`Job`] once stamped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub target: Option<TargetRef>,
    pub job_type: JobType,
    pub options: SyncOptions,
    pub priority: i32,
}

impl JobSpec {
    pub fn new(
        target: Option<TargetRef>,
        job_type: JobType,
        options: SyncOptions,
        priority: i32,
    ) -> Self {
        Self {
            target,
            job_type,
            options,
            priority,
        }
    }

    pub fn into_job(self, created_at: DateTime<Utc>) -> AppResult<Job> {
        Job::new(
            self.job_type,
            self.target,
            self.options,
            self.priority,
            created_at,
        )
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Queued -> Processing -> Completed | Failed, nothing else
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Extra fields carried by a status transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub execution_time: Option<Duration>,
    pub error: Option<JobError>,
}

impl StatusUpdate {
    pub fn completed(execution_time: Duration) -> Self {
        Self {
            execution_time: Some(execution_time),
            error: None,
        }
    }

    pub fn failed(execution_time: Option<Duration>, error: JobError) -> Self {
        Self {
            execution_time,
            error: Some(error),
        }
    }
}

/// Audit record of one job's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub execution_time: Option<Duration>,
    pub error: Option<JobError>,
    pub job_snapshot: Job,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusRecord {
    pub fn queued(job: &Job, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job.id(),
            status: JobStatus::Queued,
            queued_at: at,
            started_at: None,
            completed_at: None,
            failed_at: None,
            execution_time: None,
            error: None,
            job_snapshot: job.clone(),
            updated_at: at,
        }
    }

    /// Move to `next`, stamping the matching timestamp. Leaves the record
    /// untouched and returns `InvalidTransition` if the move is not allowed.
    pub fn apply(
        &mut self,
        next: JobStatus,
        update: StatusUpdate,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                job_id: self.job_id,
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        match next {
            JobStatus::Processing => {
                self.started_at = Some(at);
            }
            JobStatus::Completed => {
                self.completed_at = Some(at);
                self.execution_time = update.execution_time;
            }
            JobStatus::Failed => {
                self.failed_at = Some(at);
                self.execution_time = update.execution_time;
                self.error = Some(
                    update
                        .error
                        .unwrap_or_else(|| JobError::new("job failed without an error")),
                );
            }
            // Never a valid target; rejected above.
            JobStatus::Queued => {}
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_display_and_parse() {
        assert_eq!(JobType::ImageSync.to_string(), "image_sync");
        assert_eq!(
            "UPDATE_POPULARITY".parse::<JobType>().unwrap(),
            JobType::UpdatePopularity
        );
        assert!("reindex".parse::<JobType>().is_err());
    }

    #[test]
    fn test_job_status_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));

        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Queued));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn test_options_schema_per_job_type() {
        assert!(JobType::ImageSync.accepts(&SyncOptions::images_only()));
        assert!(!JobType::ImageSync.accepts(&SyncOptions::full()));
        assert!(!JobType::ImageSync.accepts(&SyncOptions::none()));
        assert!(JobType::Cleanup.accepts(&SyncOptions::none()));
        assert!(!JobType::UpdatePopularity.accepts(&SyncOptions::images_only()));
        assert!(JobType::BulkSync.accepts(&SyncOptions::full()));
    }

    #[test]
    fn test_job_requires_target_unless_cleanup() {
        let err = Job::new(JobType::Sync, None, SyncOptions::full(), 5, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = Job::new(
            JobType::Cleanup,
            Some(TargetRef::movie(1)),
            SyncOptions::none(),
            5,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let cleanup = Job::cleanup(20);
        assert!(cleanup.target().is_none());
    }

    #[test]
    fn test_deserialize_rechecks_job_shape() {
        let job = Job::sync(TargetRef::tv(42), SyncOptions::full(), 3).unwrap();
        let json = serde_json::to_value(&job).unwrap();
        let back: Job = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, job);

        let mut untargeted = json.clone();
        untargeted["target"] = serde_json::Value::Null;
        assert!(serde_json::from_value::<Job>(untargeted).is_err());

        let mut bad_options = json;
        bad_options["job_type"] = serde_json::json!("image_sync");
        let err = serde_json::from_value::<Job>(bad_options).unwrap_err();
        assert!(err.to_string().contains("not valid for image_sync"));
    }

    #[test]
    fn test_restart_keeps_work_and_changes_identity() {
        let job = Job::sync(TargetRef::tv(42), SyncOptions::without_images(), 3).unwrap();
        let restarted = job.restart(Utc::now());

        assert_ne!(restarted.id(), job.id());
        assert_eq!(restarted.target(), job.target());
        assert_eq!(restarted.options(), job.options());
        assert_eq!(restarted.job_type(), job.job_type());
        assert_eq!(restarted.priority(), job.priority());
    }

    #[test]
    fn test_gated_options_respect_config() {
        let config = SyncConfig {
            sync_videos: false,
            ..SyncConfig::new()
        };
        let gated = SyncOptions::full().gated_by(&config);
        assert!(gated.sync_images);
        assert!(!gated.sync_videos);
        assert!(gated.sync_credits);
    }

    #[test]
    fn test_record_apply_stamps_fields() {
        let job = Job::sync(TargetRef::movie(7), SyncOptions::full(), 1).unwrap();
        let t0 = Utc::now();
        let mut record = JobStatusRecord::queued(&job, t0);

        record
            .apply(JobStatus::Processing, StatusUpdate::default(), t0)
            .unwrap();
        assert_eq!(record.started_at, Some(t0));

        let t1 = t0 + chrono::Duration::seconds(3);
        record
            .apply(
                JobStatus::Failed,
                StatusUpdate::failed(Some(Duration::from_secs(3)), JobError::new("HTTP 503")),
                t1,
            )
            .unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.failed_at, Some(t1));
        assert_eq!(record.updated_at, t1);
        assert_eq!(record.error.as_ref().unwrap().message, "HTTP 503");
    }

    #[test]
    fn test_record_rejects_backwards_transition() {
        let job = Job::cleanup(20);
        let now = Utc::now();
        let mut record = JobStatusRecord::queued(&job, now);
        record
            .apply(JobStatus::Processing, StatusUpdate::default(), now)
            .unwrap();
        record
            .apply(
                JobStatus::Completed,
                StatusUpdate::completed(Duration::from_millis(10)),
                now,
            )
            .unwrap();

        let before = record.clone();
        let err = record
            .apply(JobStatus::Queued, StatusUpdate::default(), now)
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(record, before);
    }
}
