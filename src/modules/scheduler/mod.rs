/// Recurring scheduler that fills the sync queue from content-source triggers
pub mod cadence;
pub mod state;
pub mod state_repository;
pub mod ticker;
pub mod triggers;

pub use cadence::Cadence;
pub use state::{InMemoryTriggerState, TriggerStateStore};
pub use state_repository::PgTriggerStateStore;
pub use ticker::{Scheduler, TriggerSummary, TICK_INTERVAL};
pub use triggers::{
    CleanupTrigger, ImageBackfillTrigger, PopularityRefreshTrigger, RecentActivityTrigger,
    StalenessSweepTrigger, Trigger,
};
