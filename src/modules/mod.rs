pub mod jobs;
pub mod maintenance;
pub mod scheduler;
