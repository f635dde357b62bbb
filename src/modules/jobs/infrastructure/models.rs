/// Diesel models for the sync_queue and sync_job_status tables
use crate::modules::jobs::domain::entities::{Job, JobStatusRecord, TargetRef};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::{sync_job_status, sync_queue};
use crate::shared::errors::{AppError, AppResult, JobError};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;

/// Diesel model for inserting queued jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = sync_queue)]
pub struct NewQueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub target_kind: Option<String>,
    pub target_id: Option<i64>,
    pub options: JsonValue,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl NewQueuedJob {
    pub fn from_job(job: &Job) -> AppResult<Self> {
        let target = job.target();
        Ok(Self {
            id: job.id(),
            job_type: job.job_type().to_string(),
            target_kind: target.map(|t| t.kind.to_string()),
            target_id: target.map(|t| t.entity_id),
            options: serde_json::to_value(job.options())?,
            priority: job.priority(),
            created_at: job.created_at(),
        })
    }
}

/// Diesel model for querying queued jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = sync_queue)]
pub struct QueuedJobModel {
    pub seq: i64,
    pub id: Uuid,
    pub job_type: String,
    pub target_kind: Option<String>,
    pub target_id: Option<i64>,
    pub options: JsonValue,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl QueuedJobModel {
    /// Convert to domain Job
    pub fn into_job(self) -> AppResult<Job> {
        let job_type = self.job_type.parse().map_err(AppError::ValidationError)?;
        let target = match (self.target_kind, self.target_id) {
            (Some(kind), Some(entity_id)) => Some(TargetRef::new(
                kind.parse().map_err(AppError::ValidationError)?,
                entity_id,
            )),
            (None, None) => None,
            _ => {
                return Err(AppError::ValidationError(format!(
                    "queued job {} has a partial target",
                    self.id
                )))
            }
        };
        let options = serde_json::from_value(self.options)?;

        Job::restore(
            self.id,
            job_type,
            target,
            options,
            self.priority,
            self.created_at,
        )
    }
}

/// Diesel model for a status row; also used as its full-row changeset
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = sync_job_status)]
#[diesel(primary_key(job_id))]
#[diesel(treat_none_as_null = true)]
pub struct JobStatusModel {
    pub job_id: Uuid,
    pub status: JobStatusDb,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub error: Option<JsonValue>,
    pub job_snapshot: JsonValue,
    pub updated_at: DateTime<Utc>,
}

impl JobStatusModel {
    pub fn from_record(record: &JobStatusRecord) -> AppResult<Self> {
        Ok(Self {
            job_id: record.job_id,
            status: record.status.into(),
            queued_at: record.queued_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            failed_at: record.failed_at,
            execution_time_ms: record.execution_time.map(|d| d.as_millis() as i64),
            error: record.error.as_ref().map(serde_json::to_value).transpose()?,
            job_snapshot: serde_json::to_value(&record.job_snapshot)?,
            updated_at: record.updated_at,
        })
    }

    /// Convert to domain JobStatusRecord
    pub fn into_record(self) -> AppResult<JobStatusRecord> {
        let error: Option<JobError> = self.error.map(serde_json::from_value).transpose()?;
        let job_snapshot: Job = serde_json::from_value(self.job_snapshot)?;

        Ok(JobStatusRecord {
            job_id: self.job_id,
            status: self.status.into(),
            queued_at: self.queued_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            execution_time: self
                .execution_time_ms
                .map(|ms| Duration::from_millis(ms.max(0) as u64)),
            error,
            job_snapshot,
            updated_at: self.updated_at,
        })
    }
}
