/// Database test utilities with singleton pattern
///
/// Postgres tests only run when `TEST_DATABASE_URL` is set; without it
/// `get_test_db_pool` returns `None` and callers return early.
use diesel::prelude::*;
use reelsync_lib::shared::infrastructure::{Database, DbPool};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

static DB_POOL: OnceLock<Option<Arc<DbPool>>> = OnceLock::new();

/// Get or create the singleton pool, running migrations on first use
pub fn get_test_db_pool() -> Option<Arc<DbPool>> {
    DB_POOL
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let url = std::env::var("TEST_DATABASE_URL").ok()?;

            let database = Database::connect(&url).expect("Failed to create test database pool");
            database
                .run_migrations()
                .expect("Failed to run migrations on test database");

            Some(Arc::new(database.pool().clone()))
        })
        .clone()
}

/// Clean the sync tables - use at the start of each test
pub fn clean_test_db(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE sync_queue RESTART IDENTITY")
        .execute(&mut conn)
        .expect("Failed to clean sync_queue");

    diesel::sql_query("TRUNCATE TABLE sync_job_status")
        .execute(&mut conn)
        .expect("Failed to clean sync_job_status");

    diesel::sql_query("TRUNCATE TABLE sync_trigger_state")
        .execute(&mut conn)
        .expect("Failed to clean sync_trigger_state");
}

/// Global test mutex for serialization
static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Acquire test lock to ensure database tests run serially
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
