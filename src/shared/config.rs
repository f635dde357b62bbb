/// Configuration for the synchronization engine
///
/// Externalizes the operator settings, pacing, and retention windows so the
/// engine can be tuned without code changes. Values come from the environment
/// (a `.env` file is honoured) and are validated before any trigger is registered.
use crate::shared::errors::{AppError, AppResult};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Master switch for the recurring triggers
    pub auto_sync_enabled: bool,

    /// Ceiling on outbound calls to the metadata provider (1 to 5)
    pub requests_per_second: u32,

    // Content flags applied on top of each trigger's options
    pub sync_images: bool,
    pub sync_videos: bool,
    pub sync_credits: bool,

    // Worker pacing
    /// Pause between two jobs of the same batch, on top of the rate limit
    pub job_cooldown: Duration,

    /// Upper bound for a single executor call
    pub executor_timeout: Duration,

    /// How often the worker drains the queue
    pub worker_interval: Duration,

    // Housekeeping
    /// Terminal status records older than this are purged
    pub status_retention: Duration,

    /// Processing records older than this are considered abandoned
    pub stalled_job_timeout: Duration,

    /// Postgres connection string for the durable stores
    pub database_url: Option<String>,
}

pub const MIN_REQUESTS_PER_SECOND: u32 = 1;
pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

impl SyncConfig {
    /// Creates a configuration with production defaults
    pub fn new() -> Self {
        Self {
            auto_sync_enabled: false,
            requests_per_second: 4,
            sync_images: true,
            sync_videos: true,
            sync_credits: true,
            job_cooldown: Duration::from_secs(2),
            executor_timeout: Duration::from_secs(30),
            worker_interval: Duration::from_secs(15 * 60),
            status_retention: Duration::from_secs(30 * 24 * 60 * 60),
            stalled_job_timeout: Duration::from_secs(15 * 60),
            database_url: None,
        }
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; missing keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(v) = lookup("AUTO_SYNC_ENABLED") {
            config.auto_sync_enabled = parse_bool("AUTO_SYNC_ENABLED", &v)?;
        }
        if let Some(v) = lookup("SYNC_REQUESTS_PER_SECOND") {
            config.requests_per_second = parse_u64("SYNC_REQUESTS_PER_SECOND", &v)? as u32;
        }
        if let Some(v) = lookup("SYNC_IMAGES") {
            config.sync_images = parse_bool("SYNC_IMAGES", &v)?;
        }
        if let Some(v) = lookup("SYNC_VIDEOS") {
            config.sync_videos = parse_bool("SYNC_VIDEOS", &v)?;
        }
        if let Some(v) = lookup("SYNC_CREDITS") {
            config.sync_credits = parse_bool("SYNC_CREDITS", &v)?;
        }
        if let Some(v) = lookup("SYNC_JOB_COOLDOWN_MS") {
            config.job_cooldown = Duration::from_millis(parse_u64("SYNC_JOB_COOLDOWN_MS", &v)?);
        }
        if let Some(v) = lookup("SYNC_EXECUTOR_TIMEOUT_SECS") {
            config.executor_timeout =
                Duration::from_secs(parse_u64("SYNC_EXECUTOR_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("SYNC_WORKER_INTERVAL_SECS") {
            config.worker_interval =
                Duration::from_secs(parse_u64("SYNC_WORKER_INTERVAL_SECS", &v)?);
        }
        if let Some(v) = lookup("SYNC_STATUS_RETENTION_DAYS") {
            let days = parse_u64("SYNC_STATUS_RETENTION_DAYS", &v)?;
            config.status_retention = Duration::from_secs(days * 24 * 60 * 60);
        }
        if let Some(v) = lookup("SYNC_STALLED_JOB_TIMEOUT_SECS") {
            config.stalled_job_timeout =
                Duration::from_secs(parse_u64("SYNC_STALLED_JOB_TIMEOUT_SECS", &v)?);
        }
        config.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if !(MIN_REQUESTS_PER_SECOND..=MAX_REQUESTS_PER_SECOND)
            .contains(&self.requests_per_second)
        {
            return Err(AppError::ConfigurationError(format!(
                "requests_per_second must be between {} and {}, got {}",
                MIN_REQUESTS_PER_SECOND, MAX_REQUESTS_PER_SECOND, self.requests_per_second
            )));
        }
        if self.executor_timeout.is_zero() {
            return Err(AppError::ConfigurationError(
                "executor_timeout must be > 0".to_string(),
            ));
        }
        if self.worker_interval.is_zero() {
            return Err(AppError::ConfigurationError(
                "worker_interval must be > 0".to_string(),
            ));
        }
        if self.status_retention.is_zero() {
            return Err(AppError::ConfigurationError(
                "status_retention must be > 0".to_string(),
            ));
        }
        if self.stalled_job_timeout.is_zero() {
            return Err(AppError::ConfigurationError(
                "stalled_job_timeout must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::ConfigurationError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> AppResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| AppError::ConfigurationError(format!("{}: {}", key, e)))
}
