/// Background sync job module
///
/// Provides the durable job queue and status audit log behind the metadata
/// synchronization engine:
/// - Domain: jobs, statuses and the store traits
/// - Infrastructure: Diesel/Postgres stores and in-memory stores
/// - Application: operator service and the collaborator ports
/// - Worker: batch processor that drains the queue
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod worker;

// Re-exports for easy access
pub use application::{Cache, ContentSource, SyncExecutor, SyncService};
pub use domain::{
    entities::{
        EntityKind, Job, JobSpec, JobStatus, JobStatusRecord, JobType, StatusUpdate, SyncOptions,
        TargetRef,
    },
    repository::{JobQueue, QueueStatistics, StatusCounts, StatusStore},
};
pub use infrastructure::{InMemoryJobQueue, InMemoryStatusStore, PgJobQueue, PgStatusStore};
pub use worker::{BackgroundWorker, CycleReport, WorkerSettings, WorkerStatistics, MAX_BATCH};
