/// Periodic housekeeping: cache expiry, status retention, orphan cleanup,
/// stalled-job recovery and storage compaction
pub mod cache;
pub mod runner;

pub use cache::{CacheStats, MetadataCache};
pub use runner::{
    MaintenanceReport, MaintenanceRunner, MaintenanceSettings, StepOutcome, MAINTENANCE_INTERVAL,
};
