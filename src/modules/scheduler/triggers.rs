/// Built-in triggers
///
/// Each trigger asks the content source one question and turns the answer
/// into job specs. None of them deduplicate: overlapping triggers may well
/// queue the same target twice, and the executor's upserts absorb that.
use async_trait::async_trait;
use std::time::Duration;

use crate::modules::jobs::application::ContentSource;
use crate::modules::jobs::domain::{JobSpec, JobType, SyncOptions};
use crate::shared::config::SyncConfig;
use crate::shared::errors::AppResult;

pub const RECENT_ACTIVITY_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const STALENESS_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const POPULARITY_TOP_N: usize = 50;

/// Discovers work for the scheduler
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Unique name, used for summaries and manual firing
    fn name(&self) -> &str;

    async fn discover(&self, source: &dyn ContentSource) -> AppResult<Vec<JobSpec>>;
}

/// Entities touched in the last hour, synced without images
pub struct RecentActivityTrigger {
    options: SyncOptions,
    priority: i32,
}

impl RecentActivityTrigger {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            options: SyncOptions::without_images().gated_by(config),
            priority: 5,
        }
    }
}

#[async_trait]
impl Trigger for RecentActivityTrigger {
    fn name(&self) -> &str {
        "recent_activity"
    }

    async fn discover(&self, source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
        let targets = source.find_recently_modified(RECENT_ACTIVITY_WINDOW).await?;
        Ok(targets
            .into_iter()
            .map(|target| JobSpec::new(Some(target), JobType::Sync, self.options, self.priority))
            .collect())
    }
}

/// Entities with no primary image. Only registered while image sync is on.
pub struct ImageBackfillTrigger {
    options: SyncOptions,
    priority: i32,
}

impl ImageBackfillTrigger {
    pub fn new() -> Self {
        Self {
            options: SyncOptions::images_only(),
            priority: 8,
        }
    }
}

impl Default for ImageBackfillTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Trigger for ImageBackfillTrigger {
    fn name(&self) -> &str {
        "image_backfill"
    }

    async fn discover(&self, source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
        let targets = source.find_missing_images().await?;
        Ok(targets
            .into_iter()
            .map(|target| {
                JobSpec::new(Some(target), JobType::ImageSync, self.options, self.priority)
            })
            .collect())
    }
}

/// Entities not synced for a week, refreshed in full
pub struct StalenessSweepTrigger {
    options: SyncOptions,
    priority: i32,
}

impl StalenessSweepTrigger {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            options: SyncOptions::full().gated_by(config),
            priority: 10,
        }
    }
}

#[async_trait]
impl Trigger for StalenessSweepTrigger {
    fn name(&self) -> &str {
        "staleness_sweep"
    }

    async fn discover(&self, source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
        let targets = source.find_stale(STALENESS_WINDOW).await?;
        Ok(targets
            .into_iter()
            .map(|target| JobSpec::new(Some(target), JobType::BulkSync, self.options, self.priority))
            .collect())
    }
}

pub struct PopularityRefreshTrigger {
    top_n: usize,
    priority: i32,
}

impl PopularityRefreshTrigger {
    pub fn new() -> Self {
        Self {
            top_n: POPULARITY_TOP_N,
            priority: 7,
        }
    }
}

impl Default for PopularityRefreshTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Trigger for PopularityRefreshTrigger {
    fn name(&self) -> &str {
        "popularity_refresh"
    }

    async fn discover(&self, source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
        let targets = source.top_by_popularity(self.top_n).await?;
        Ok(targets
            .into_iter()
            .map(|target| {
                JobSpec::new(
                    Some(target),
                    JobType::UpdatePopularity,
                    SyncOptions::none(),
                    self.priority,
                )
            })
            .collect())
    }
}

/// Always yields exactly one untargeted cleanup job
pub struct CleanupTrigger {
    priority: i32,
}

impl CleanupTrigger {
    pub fn new() -> Self {
        Self { priority: 20 }
    }
}

impl Default for CleanupTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Trigger for CleanupTrigger {
    fn name(&self) -> &str {
        "cleanup"
    }

    async fn discover(&self, _source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
        Ok(vec![JobSpec::new(
            None,
            JobType::Cleanup,
            SyncOptions::none(),
            self.priority,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_activity_never_syncs_images() {
        let trigger = RecentActivityTrigger::new(&SyncConfig::default());
        assert!(!trigger.options.sync_images);
        assert!(trigger.options.sync_videos);
        assert!(trigger.options.sync_credits);
    }

    #[test]
    fn test_staleness_sweep_respects_config_flags() {
        let config = SyncConfig {
            sync_videos: false,
            ..SyncConfig::default()
        };
        let trigger = StalenessSweepTrigger::new(&config);

        assert!(trigger.options.sync_images);
        assert!(!trigger.options.sync_videos);
        assert!(trigger.options.sync_credits);
    }

    #[test]
    fn test_image_backfill_options_fit_job_type() {
        let trigger = ImageBackfillTrigger::new();
        assert!(trigger.options.sync_images);
        assert!(JobType::ImageSync.accepts(&trigger.options));
    }
}
