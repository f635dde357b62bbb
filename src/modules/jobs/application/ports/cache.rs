use async_trait::async_trait;

use crate::shared::errors::AppResult;

/// Port (interface) for the provider response cache
#[async_trait]
pub trait Cache: Send + Sync {
    /// Drop entries past their TTL, returning how many were removed
    async fn purge_expired(&self) -> AppResult<usize>;
}
