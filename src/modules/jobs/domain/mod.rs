pub mod entities;
pub mod repository;
pub mod value_objects;

pub use entities::{
    EntityKind, Job, JobSpec, JobStatus, JobStatusRecord, JobType, StatusUpdate, SyncOptions,
    TargetRef,
};
pub use repository::{JobQueue, QueueStatistics, StatusCounts, StatusStore};
pub use value_objects::JobStatusDb;
