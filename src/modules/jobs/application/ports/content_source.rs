use async_trait::async_trait;
use std::time::Duration;

use crate::modules::jobs::domain::TargetRef;
use crate::shared::errors::AppResult;

/// Port (interface) onto the local content catalogue
/// Answers "what needs syncing" for the scheduler's triggers and removes
/// synced records whose owning content is gone.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Entities not synced within `window`
    async fn find_stale(&self, window: Duration) -> AppResult<Vec<TargetRef>>;

    /// Entities without a primary image
    async fn find_missing_images(&self) -> AppResult<Vec<TargetRef>>;

    /// Entities modified within `window`
    async fn find_recently_modified(&self, window: Duration) -> AppResult<Vec<TargetRef>>;

    /// The `n` most popular entities by last known score, most popular first
    async fn top_by_popularity(&self, n: usize) -> AppResult<Vec<TargetRef>>;

    /// Delete synced records whose content entity no longer exists
    async fn remove_orphans(&self) -> AppResult<usize>;

    /// Optimise the content storage
    async fn compact(&self) -> AppResult<()> {
        Ok(())
    }
}
