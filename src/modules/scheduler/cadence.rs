use serde::{Deserialize, Serialize};
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// How often a trigger fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    EveryFifteenMinutes,
    EveryThirtyMinutes,
    Hourly,
    TwiceDaily,
    Daily,
    Weekly,
    Custom(Duration),
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::EveryFifteenMinutes => Duration::from_secs(15 * MINUTE),
            Cadence::EveryThirtyMinutes => Duration::from_secs(30 * MINUTE),
            Cadence::Hourly => Duration::from_secs(HOUR),
            Cadence::TwiceDaily => Duration::from_secs(12 * HOUR),
            Cadence::Daily => Duration::from_secs(DAY),
            Cadence::Weekly => Duration::from_secs(7 * DAY),
            Cadence::Custom(interval) => *interval,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::EveryFifteenMinutes => write!(f, "every 15 minutes"),
            Cadence::EveryThirtyMinutes => write!(f, "every 30 minutes"),
            Cadence::Hourly => write!(f, "hourly"),
            Cadence::TwiceDaily => write!(f, "twice daily"),
            Cadence::Daily => write!(f, "daily"),
            Cadence::Weekly => write!(f, "weekly"),
            Cadence::Custom(interval) => write!(f, "every {}s", interval.as_secs()),
        }
    }
}
