//! Minimum-interval rate limiter guarding the metadata provider's quota.
//!
//! Check-and-stamp happens under one lock, and concurrent waiters queue on an
//! async gate, so the effective call rate never exceeds the configured ceiling
//! no matter how many tasks share the limiter.
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;

#[derive(Debug)]
struct LimiterState {
    last_request: Option<Instant>,
    requests_per_second: u32,
}

impl LimiterState {
    fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second as f64)
    }

    fn remaining(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => self
                .min_interval()
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    gate: tokio::sync::Mutex<()>,
}

impl RateLimiter {
    /// `requests_per_second` is clamped to at least 1.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                last_request: None,
                requests_per_second: requests_per_second.max(1),
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Sleep until the minimum interval since the last request has passed, then
    /// stamp the current instant as the last request.
    pub async fn wait_if_needed(&self) {
        let _gate = self.gate.lock().await;

        loop {
            let wait = {
                let mut state = self.lock_state();
                let now = Instant::now();
                let remaining = state.remaining(now);
                if remaining.is_zero() {
                    state.last_request = Some(now);
                    return;
                }
                remaining
            };
            // The limit may change while we sleep, so re-check afterwards.
            sleep(wait).await;
        }
    }

    pub fn can_make_request(&self) -> bool {
        self.time_until_next_request().is_zero()
    }

    pub fn record_request(&self) {
        self.lock_state().last_request = Some(Instant::now());
    }

    pub fn set_limit(&self, requests_per_second: u32) {
        let requests_per_second = requests_per_second.max(1);
        self.lock_state().requests_per_second = requests_per_second;
        log::debug!("Rate limit set to {} requests/second", requests_per_second);
    }

    pub fn requests_per_second(&self) -> u32 {
        self.lock_state().requests_per_second
    }

    pub fn time_until_next_request(&self) -> Duration {
        self.lock_state().remaining(Instant::now())
    }

    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        // The state is two plain values; a poisoned lock cannot leave them torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_SECOND)
    }
}
