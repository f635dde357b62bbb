//! Recurring trigger scheduler.
//!
//! Keeps a table of registered triggers with their cadence. Fire times live
//! in a [`TriggerStateStore`], so cadence holds across restarts and across
//! schedulers sharing one store. Every tick claims the triggers that are due,
//! truncates what they discover to the trigger's batch size and enqueues the
//! rest through the sync service.

use crate::modules::jobs::application::{ContentSource, SyncService};
use crate::modules::scheduler::cadence::Cadence;
use crate::modules::scheduler::state::TriggerStateStore;
use crate::modules::scheduler::triggers::{
    CleanupTrigger, ImageBackfillTrigger, PopularityRefreshTrigger, RecentActivityTrigger,
    StalenessSweepTrigger, Trigger,
};
use crate::shared::config::SyncConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::clock::Clock;
use crate::shared::utils::logger::LogContext;
use crate::{log_debug, log_info};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default tick interval for the scheduler loop.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one trigger firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSummary {
    pub trigger: String,
    pub fired_at: DateTime<Utc>,
    /// Targets the trigger discovered, before truncation to the batch size.
    pub found: usize,
    pub enqueued: usize,
    pub duration: Duration,
}

struct RegisteredTrigger {
    cadence: Cadence,
    batch_size: usize,
    trigger: Arc<dyn Trigger>,
}

pub struct Scheduler {
    config: SyncConfig,
    service: Arc<SyncService>,
    source: Arc<dyn ContentSource>,
    state: Arc<dyn TriggerStateStore>,
    clock: Arc<dyn Clock>,
    triggers: RwLock<Vec<RegisteredTrigger>>,
    summaries: RwLock<HashMap<String, TriggerSummary>>,
}

impl Scheduler {
    pub fn new(
        config: SyncConfig,
        service: Arc<SyncService>,
        source: Arc<dyn ContentSource>,
        state: Arc<dyn TriggerStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            service,
            source,
            state,
            clock,
            triggers: RwLock::new(Vec::new()),
            summaries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a trigger. Names must be unique and the batch size non-zero.
    ///
    /// Returns `false` without registering while auto-sync is switched off.
    /// An invalid configuration is refused with `ConfigurationError`.
    pub async fn register_trigger(
        &self,
        cadence: Cadence,
        batch_size: usize,
        trigger: Arc<dyn Trigger>,
    ) -> AppResult<bool> {
        self.config.validate()?;

        if !self.config.auto_sync_enabled {
            log_debug!("Auto-sync disabled; trigger '{}' not registered", trigger.name());
            return Ok(false);
        }
        if batch_size == 0 {
            return Err(AppError::ValidationError(format!(
                "trigger '{}' needs a batch size of at least 1",
                trigger.name()
            )));
        }
        if cadence.interval().is_zero() {
            return Err(AppError::ValidationError(format!(
                "trigger '{}' needs a non-zero cadence",
                trigger.name()
            )));
        }

        let mut triggers = self.triggers.write().await;
        if triggers.iter().any(|t| t.trigger.name() == trigger.name()) {
            return Err(AppError::ValidationError(format!(
                "trigger '{}' is already registered",
                trigger.name()
            )));
        }

        log_debug!(
            "Registered trigger '{}' ({}, batch {})",
            trigger.name(),
            cadence,
            batch_size
        );
        triggers.push(RegisteredTrigger {
            cadence,
            batch_size,
            trigger,
        });
        Ok(true)
    }

    /// Register the built-in trigger set. Registers nothing while auto-sync is
    /// switched off, and nothing at all on an invalid configuration. Image
    /// backfill is left out while image sync is off.
    pub async fn register_default_triggers(&self) -> AppResult<usize> {
        self.config.validate()?;

        if !self.config.auto_sync_enabled {
            log_info!("Auto-sync disabled; no triggers registered");
            return Ok(0);
        }

        let config = &self.config;
        let mut defaults: Vec<(Cadence, usize, Arc<dyn Trigger>)> = Vec::with_capacity(5);
        defaults.push((Cadence::Hourly, 50, Arc::new(RecentActivityTrigger::new(config))));
        if config.sync_images {
            defaults.push((Cadence::TwiceDaily, 25, Arc::new(ImageBackfillTrigger::new())));
        }
        defaults.push((Cadence::Daily, 100, Arc::new(StalenessSweepTrigger::new(config))));
        defaults.push((Cadence::Weekly, 50, Arc::new(PopularityRefreshTrigger::new())));
        defaults.push((Cadence::Daily, 1, Arc::new(CleanupTrigger::new())));

        let mut count = 0;
        for (cadence, batch_size, trigger) in defaults {
            if self.register_trigger(cadence, batch_size, trigger).await? {
                count += 1;
            }
        }

        log_info!("Registered {} sync triggers", count);
        Ok(count)
    }

    /// Fire one trigger right now, whether or not it is due.
    pub async fn fire(&self, name: &str) -> AppResult<TriggerSummary> {
        let (trigger, batch_size) = {
            let triggers = self.triggers.read().await;
            let entry = triggers
                .iter()
                .find(|t| t.trigger.name() == name)
                .ok_or_else(|| AppError::NotFound(format!("Trigger '{}' not found", name)))?;
            (Arc::clone(&entry.trigger), entry.batch_size)
        };

        let now = self.clock.now();
        if let Err(e) = self.state.record_fired(name, now).await {
            LogContext::error_with_context(&e, &format!("Could not record fire of '{}'", name));
        }
        self.run_trigger(trigger.as_ref(), batch_size, now).await
    }

    /// Fire every trigger that is due at `now`. A trigger is claimed before
    /// it runs, so a failing one still waits out its cadence. A failing
    /// trigger is logged and the rest still run.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<TriggerSummary> {
        let registered: Vec<(Arc<dyn Trigger>, Cadence, usize)> = {
            let triggers = self.triggers.read().await;
            triggers
                .iter()
                .map(|t| (Arc::clone(&t.trigger), t.cadence, t.batch_size))
                .collect()
        };

        let mut fired = Vec::new();
        for (trigger, cadence, batch_size) in registered {
            match self.state.claim(trigger.name(), now, cadence.interval()).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    LogContext::error_with_context(
                        &e,
                        &format!("Could not claim trigger '{}'", trigger.name()),
                    );
                    continue;
                }
            }

            match self.run_trigger(trigger.as_ref(), batch_size, now).await {
                Ok(summary) => fired.push(summary),
                Err(e) => {
                    LogContext::error_with_context(
                        &e,
                        &format!("Trigger '{}' failed", trigger.name()),
                    );
                }
            }
        }

        fired
    }

    async fn run_trigger(
        &self,
        trigger: &dyn Trigger,
        batch_size: usize,
        now: DateTime<Utc>,
    ) -> AppResult<TriggerSummary> {
        let started = Instant::now();

        let mut specs = trigger.discover(self.source.as_ref()).await?;
        let found = specs.len();
        specs.truncate(batch_size);

        let mut enqueued = 0;
        for spec in specs {
            match self.service.enqueue_spec(spec).await {
                Ok(_) => enqueued += 1,
                Err(e) => LogContext::error_with_context(
                    &e,
                    &format!("Trigger '{}' could not enqueue a job", trigger.name()),
                ),
            }
        }

        let duration = started.elapsed();
        LogContext::trigger_fired(trigger.name(), found, enqueued, duration.as_millis() as u64);

        let summary = TriggerSummary {
            trigger: trigger.name().to_string(),
            fired_at: now,
            found,
            enqueued,
            duration,
        };
        self.summaries
            .write()
            .await
            .insert(summary.trigger.clone(), summary.clone());

        Ok(summary)
    }

    /// When `name` last fired, according to the shared trigger state
    pub async fn last_fired(&self, name: &str) -> AppResult<Option<DateTime<Utc>>> {
        self.state.last_fired(name).await
    }

    /// Latest summary per trigger, sorted by trigger name.
    pub async fn summaries(&self) -> Vec<TriggerSummary> {
        let mut summaries: Vec<TriggerSummary> =
            self.summaries.read().await.values().cloned().collect();
        summaries.sort_by(|a, b| a.trigger.cmp(&b.trigger));
        summaries
    }

    pub async fn trigger_names(&self) -> Vec<String> {
        self.triggers
            .read()
            .await
            .iter()
            .map(|t| t.trigger.name().to_string())
            .collect()
    }

    /// Spawn the ticker loop. Stops at the next tick boundary once `cancel`
    /// fires.
    pub fn start(self: Arc<Self>, tick_interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            log_info!("Sync scheduler started (tick: {:?})", tick_interval);
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let fired = self.tick(self.clock.now()).await;
                if !fired.is_empty() {
                    log_debug!("Scheduler tick fired {} triggers", fired.len());
                }
            }

            log_info!("Sync scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::jobs::domain::{JobSpec, TargetRef};
    use crate::modules::jobs::infrastructure::{InMemoryJobQueue, InMemoryStatusStore};
    use crate::modules::scheduler::state::InMemoryTriggerState;
    use crate::shared::utils::clock::ManualClock;
    use async_trait::async_trait;

    struct NamedTrigger(&'static str);

    #[async_trait]
    impl Trigger for NamedTrigger {
        fn name(&self) -> &str {
            self.0
        }

        async fn discover(&self, _source: &dyn ContentSource) -> AppResult<Vec<JobSpec>> {
            Ok(Vec::new())
        }
    }

    fn scheduler_with(config: SyncConfig) -> Scheduler {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let service = Arc::new(SyncService::new(
            Arc::new(InMemoryJobQueue::new()),
            Arc::new(InMemoryStatusStore::new(Arc::clone(&clock))),
            Arc::clone(&clock),
        ));
        Scheduler::new(
            config,
            service,
            Arc::new(EmptySource),
            Arc::new(InMemoryTriggerState::new()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_zero_batch() {
        let scheduler = scheduler_with(SyncConfig {
            auto_sync_enabled: true,
            ..SyncConfig::default()
        });

        assert!(scheduler
            .register_trigger(Cadence::Hourly, 10, Arc::new(NamedTrigger("a")))
            .await
            .unwrap());

        let duplicate = scheduler
            .register_trigger(Cadence::Daily, 10, Arc::new(NamedTrigger("a")))
            .await;
        assert!(matches!(duplicate, Err(AppError::ValidationError(_))));

        let zero = scheduler
            .register_trigger(Cadence::Daily, 0, Arc::new(NamedTrigger("b")))
            .await;
        assert!(matches!(zero, Err(AppError::ValidationError(_))));

        assert_eq!(scheduler.trigger_names().await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_register_is_a_no_op_while_auto_sync_is_off() {
        let scheduler = scheduler_with(SyncConfig::default());

        let registered = scheduler
            .register_trigger(Cadence::Hourly, 10, Arc::new(NamedTrigger("a")))
            .await
            .unwrap();

        assert!(!registered);
        assert!(scheduler.trigger_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_register_refuses_invalid_config() {
        let scheduler = scheduler_with(SyncConfig {
            auto_sync_enabled: true,
            requests_per_second: 0,
            ..SyncConfig::default()
        });

        let result = scheduler
            .register_trigger(Cadence::Hourly, 10, Arc::new(NamedTrigger("a")))
            .await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    struct EmptySource;

    #[async_trait]
    impl ContentSource for EmptySource {
        async fn find_stale(&self, _window: Duration) -> AppResult<Vec<TargetRef>> {
            Ok(Vec::new())
        }

        async fn find_missing_images(&self) -> AppResult<Vec<TargetRef>> {
            Ok(Vec::new())
        }

        async fn find_recently_modified(
            &self,
            _window: Duration,
        ) -> AppResult<Vec<TargetRef>> {
            Ok(Vec::new())
        }

        async fn top_by_popularity(&self, _n: usize) -> AppResult<Vec<TargetRef>> {
            Ok(Vec::new())
        }

        async fn remove_orphans(&self) -> AppResult<usize> {
            Ok(0)
        }
    }
}
