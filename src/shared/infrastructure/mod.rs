/// Shared infrastructure concerns
///
/// Infrastructure implementations shared across the bounded contexts.
pub mod database;

// Re-exports for convenience
pub use database::{Database, DbConnection, DbPool};
