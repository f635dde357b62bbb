/// Diesel-based implementation of StatusStore
///
/// Transitions lock the status row (SELECT ... FOR UPDATE) inside a
/// transaction, validate against the domain rules, and write the whole row back.
use crate::modules::jobs::domain::entities::{Job, JobStatus, JobStatusRecord, StatusUpdate};
use crate::modules::jobs::domain::repository::{StatusCounts, StatusStore};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::modules::jobs::infrastructure::models::JobStatusModel;
use crate::schema::sync_job_status;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use crate::shared::utils::clock::Clock;
use crate::shared::utils::logger::TimedOperation;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Helper struct for GROUP BY status
#[derive(QueryableByName)]
struct StatusCount {
    #[diesel(sql_type = diesel::sql_types::Text)]
    status: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

pub struct PgStatusStore {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl PgStatusStore {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Get database connection from pool
    fn get_conn(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get connection: {}", e)))
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn create(&self, job: &Job) -> AppResult<JobStatusRecord> {
        let record = JobStatusRecord::queued(job, self.clock.now());
        let row = JobStatusModel::from_record(&record)?;
        let mut conn = self.get_conn()?;

        let inserted = diesel::insert_into(sync_job_status::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to create job status: {}", e)))?;

        if inserted == 0 {
            return Err(AppError::ValidationError(format!(
                "Status for job {} already exists",
                job.id()
            )));
        }

        Ok(record)
    }

    async fn transition(
        &self,
        job_id: Uuid,
        status: JobStatus,
        update: StatusUpdate,
    ) -> AppResult<JobStatusRecord> {
        let now = self.clock.now();
        let mut conn = self.get_conn()?;

        let result = conn.transaction::<JobStatusRecord, AppError, _>(|conn| {
            let current: Option<JobStatusModel> = sync_job_status::table
                .find(job_id)
                .select(JobStatusModel::as_select())
                .for_update()
                .first(conn)
                .optional()?;

            let mut record = current
                .ok_or_else(|| AppError::NotFound(format!("Job status {} not found", job_id)))?
                .into_record()?;

            record.apply(status, update, now)?;

            let changes = JobStatusModel::from_record(&record)?;
            diesel::update(sync_job_status::table.find(job_id))
                .set(&changes)
                .execute(conn)?;

            Ok(record)
        });

        if let Err(e @ AppError::InvalidTransition { .. }) = &result {
            log::error!("Rejected status change: {}", e);
        }

        result
    }

    async fn get(&self, job_id: Uuid) -> AppResult<JobStatusRecord> {
        let mut conn = self.get_conn()?;

        let row: Option<JobStatusModel> = sync_job_status::table
            .find(job_id)
            .select(JobStatusModel::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get job status: {}", e)))?;

        row.ok_or_else(|| AppError::NotFound(format!("Job status {} not found", job_id)))?
            .into_record()
    }

    async fn list_by_status(&self, status: JobStatus) -> AppResult<Vec<JobStatusRecord>> {
        let mut conn = self.get_conn()?;

        let rows: Vec<JobStatusModel> = sync_job_status::table
            .filter(sync_job_status::status.eq(JobStatusDb::from(status)))
            .order(sync_job_status::queued_at.asc())
            .select(JobStatusModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to list job statuses: {}", e)))?;

        rows.into_iter().map(JobStatusModel::into_record).collect()
    }

    async fn delete_older_than(&self, age: Duration) -> AppResult<usize> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| AppError::ValidationError(format!("Retention window too large: {}", e)))?;
        let cutoff = self.clock.now() - age;
        let mut conn = self.get_conn()?;

        let deleted = diesel::delete(
            sync_job_status::table
                .filter(
                    sync_job_status::status
                        .eq(JobStatusDb::Completed)
                        .or(sync_job_status::status.eq(JobStatusDb::Failed)),
                )
                .filter(sync_job_status::updated_at.lt(cutoff)),
        )
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete old statuses: {}", e)))?;

        Ok(deleted)
    }

    async fn counts(&self) -> AppResult<StatusCounts> {
        let mut conn = self.get_conn()?;

        let rows: Vec<StatusCount> = diesel::sql_query(
            "SELECT status::text AS status, COUNT(*) AS count
             FROM sync_job_status
             GROUP BY status",
        )
        .load(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to count statuses: {}", e)))?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: JobStatus = row.status.parse().map_err(AppError::DatabaseError)?;
            counts.add(status, row.count as usize);
        }
        Ok(counts)
    }

    async fn compact(&self) -> AppResult<()> {
        let timer = TimedOperation::new("vacuum sync tables");
        let mut conn = self.get_conn()?;

        // VACUUM cannot run inside a transaction block; each statement runs on its own.
        for table in ["sync_job_status", "sync_queue"] {
            diesel::sql_query(format!("VACUUM ANALYZE {}", table))
                .execute(&mut conn)
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to vacuum {}: {}", table, e))
                })?;
        }

        timer.finish();
        Ok(())
    }
}
