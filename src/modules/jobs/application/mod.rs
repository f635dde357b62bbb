pub mod ports;
pub mod service;

pub use ports::{Cache, ContentSource, SyncExecutor};
pub use service::SyncService;
