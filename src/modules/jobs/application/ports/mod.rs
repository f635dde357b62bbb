pub mod cache;
pub mod content_source;
pub mod sync_executor;

pub use cache::Cache;
pub use content_source::ContentSource;
pub use sync_executor::SyncExecutor;
