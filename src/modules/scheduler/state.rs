//! Trigger fire times.
//!
//! The scheduler keeps no cadence state of its own: every tick asks the
//! store to claim a due trigger, so a restarted process (or a second
//! scheduler over the same storage) picks up where the last one left off.
use crate::shared::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Last fire time per trigger name
#[async_trait]
pub trait TriggerStateStore: Send + Sync {
    async fn last_fired(&self, trigger: &str) -> AppResult<Option<DateTime<Utc>>>;

    /// Record `now` as the fire time if the trigger is due, in one atomic
    /// step. `false` means it already fired within `cadence`.
    async fn claim(&self, trigger: &str, now: DateTime<Utc>, cadence: Duration)
        -> AppResult<bool>;

    /// Record a fire time unconditionally
    async fn record_fired(&self, trigger: &str, at: DateTime<Utc>) -> AppResult<()>;
}

/// Due rule shared by the stores. A clock that went backwards is never due.
pub fn is_due(last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>, cadence: Duration) -> bool {
    match last_fired {
        None => true,
        Some(last) => (now - last)
            .to_std()
            .map(|elapsed| elapsed >= cadence)
            .unwrap_or(false),
    }
}

#[derive(Default)]
pub struct InMemoryTriggerState {
    fired: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryTriggerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, HashMap<String, DateTime<Utc>>>> {
        self.fired
            .lock()
            .map_err(|_| AppError::InternalError("trigger state lock poisoned".to_string()))
    }
}

#[async_trait]
impl TriggerStateStore for InMemoryTriggerState {
    async fn last_fired(&self, trigger: &str) -> AppResult<Option<DateTime<Utc>>> {
        Ok(self.lock()?.get(trigger).copied())
    }

    async fn claim(
        &self,
        trigger: &str,
        now: DateTime<Utc>,
        cadence: Duration,
    ) -> AppResult<bool> {
        let mut fired = self.lock()?;
        if !is_due(fired.get(trigger).copied(), now, cadence) {
            return Ok(false);
        }
        fired.insert(trigger.to_string(), now);
        Ok(true)
    }

    async fn record_fired(&self, trigger: &str, at: DateTime<Utc>) -> AppResult<()> {
        self.lock()?.insert(trigger.to_string(), at);
        Ok(())
    }
}
