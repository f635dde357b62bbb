/// Diesel-based implementation of TriggerStateStore
///
/// A claim is one conditional upsert, so two schedulers ticking at the same
/// moment cannot both fire the same trigger.
use crate::modules::scheduler::state::TriggerStateStore;
use crate::schema::sync_trigger_state;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;

pub struct PgTriggerStateStore {
    pool: DbPool,
}

impl PgTriggerStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get database connection from pool
    fn get_conn(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get connection: {}", e)))
    }
}

#[async_trait]
impl TriggerStateStore for PgTriggerStateStore {
    async fn last_fired(&self, trigger: &str) -> AppResult<Option<DateTime<Utc>>> {
        let mut conn = self.get_conn()?;

        sync_trigger_state::table
            .filter(sync_trigger_state::trigger_name.eq(trigger))
            .select(sync_trigger_state::last_fired_at)
            .first::<DateTime<Utc>>(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to read trigger state: {}", e)))
    }

    async fn claim(
        &self,
        trigger: &str,
        now: DateTime<Utc>,
        cadence: Duration,
    ) -> AppResult<bool> {
        let cadence = chrono::Duration::from_std(cadence)
            .map_err(|e| AppError::ValidationError(format!("Cadence too large: {}", e)))?;
        let mut conn = self.get_conn()?;

        let claimed = diesel::sql_query(
            r#"
            INSERT INTO sync_trigger_state (trigger_name, last_fired_at)
            VALUES ($1, $2)
            ON CONFLICT (trigger_name) DO UPDATE
                SET last_fired_at = EXCLUDED.last_fired_at
                WHERE sync_trigger_state.last_fired_at <= $3
            "#,
        )
        .bind::<diesel::sql_types::Text, _>(trigger)
        .bind::<diesel::sql_types::Timestamptz, _>(now)
        .bind::<diesel::sql_types::Timestamptz, _>(now - cadence)
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to claim trigger: {}", e)))?;

        Ok(claimed == 1)
    }

    async fn record_fired(&self, trigger: &str, at: DateTime<Utc>) -> AppResult<()> {
        let mut conn = self.get_conn()?;

        diesel::insert_into(sync_trigger_state::table)
            .values((
                sync_trigger_state::trigger_name.eq(trigger),
                sync_trigger_state::last_fired_at.eq(at),
            ))
            .on_conflict(sync_trigger_state::trigger_name)
            .do_update()
            .set(sync_trigger_state::last_fired_at.eq(at))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to record trigger fire: {}", e)))?;

        Ok(())
    }
}
