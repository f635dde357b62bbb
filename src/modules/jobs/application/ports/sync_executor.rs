use async_trait::async_trait;

use crate::modules::jobs::domain::Job;
use crate::shared::errors::AppResult;

/// Port (interface) for the component that talks to the metadata provider
/// Fetches the provider's data for the job's target and upserts it locally.
/// Must be idempotent: the same target may be synced twice in a row.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    async fn execute(&self, job: &Job) -> AppResult<()>;
}
