/// Value objects for jobs domain
use super::entities::JobStatus;
use serde::{Deserialize, Serialize};

/// Job status enum matching database type
#[derive(diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[ExistingTypePath = "crate::schema::sql_types::SyncJobStatusKind"]
#[serde(rename_all = "lowercase")]
pub enum JobStatusDb {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl From<JobStatus> for JobStatusDb {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Queued => JobStatusDb::Queued,
            JobStatus::Processing => JobStatusDb::Processing,
            JobStatus::Completed => JobStatusDb::Completed,
            JobStatus::Failed => JobStatusDb::Failed,
        }
    }
}

impl From<JobStatusDb> for JobStatus {
    fn from(status: JobStatusDb) -> Self {
        match status {
            JobStatusDb::Queued => JobStatus::Queued,
            JobStatusDb::Processing => JobStatus::Processing,
            JobStatusDb::Completed => JobStatus::Completed,
            JobStatusDb::Failed => JobStatus::Failed,
        }
    }
}

impl std::fmt::Display for JobStatusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        JobStatus::from(*self).fmt(f)
    }
}
