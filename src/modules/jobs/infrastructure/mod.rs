pub mod memory;
pub mod models;
pub mod queue_repository;
pub mod status_repository;

pub use memory::{InMemoryJobQueue, InMemoryStatusStore};
pub use queue_repository::PgJobQueue;
pub use status_repository::PgStatusStore;
