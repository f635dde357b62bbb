/// Diesel-based implementation of JobQueue
///
/// Dequeue is a single DELETE ... RETURNING over a SKIP LOCKED sub-select, so
/// concurrent workers (even in different processes) never share a job.
use crate::modules::jobs::domain::entities::Job;
use crate::modules::jobs::domain::repository::{JobQueue, QueueStatistics};
use crate::modules::jobs::infrastructure::models::{NewQueuedJob, QueuedJobModel};
use crate::schema::sync_queue;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Helper struct for GROUP BY job_type
#[derive(QueryableByName)]
struct TypeCount {
    #[diesel(sql_type = diesel::sql_types::Text)]
    job_type: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

/// Helper struct for GROUP BY priority
#[derive(QueryableByName)]
struct PriorityCount {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    priority: i32,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

/// Helper struct for the queue's age bounds
#[derive(QueryableByName)]
struct QueueBounds {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    total: i64,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    oldest: Option<DateTime<Utc>>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    newest: Option<DateTime<Utc>>,
}

pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
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
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: Job) -> AppResult<Uuid> {
        let new_job = NewQueuedJob::from_job(&job)?;
        let mut conn = self.get_conn()?;

        diesel::insert_into(sync_queue::table)
            .values(&new_job)
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to enqueue job: {}", e)))?;

        Ok(job.id())
    }

    async fn dequeue_batch(&self, max_count: usize) -> AppResult<Vec<Job>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }

        let started = std::time::Instant::now();
        let mut conn = self.get_conn()?;

        let mut rows: Vec<QueuedJobModel> = diesel::sql_query(
            r#"
            DELETE FROM sync_queue
            WHERE id IN (
                SELECT id
                FROM sync_queue
                ORDER BY priority ASC, created_at ASC, seq ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING seq, id, job_type, target_kind, target_id,
                      options, priority, created_at
            "#,
        )
        .bind::<diesel::sql_types::BigInt, _>(max_count as i64)
        .load(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to dequeue jobs: {}", e)))?;

        LogContext::db_operation(
            "dequeue_batch",
            "sync_queue",
            Some(started.elapsed().as_millis() as u64),
        );

        // RETURNING does not preserve the sub-select's order.
        rows.sort_by(|a, b| {
            (a.priority, a.created_at, a.seq).cmp(&(b.priority, b.created_at, b.seq))
        });

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_job() {
                Ok(job) => jobs.push(job),
                // The row is already gone; keep the rest of the batch.
                Err(e) => log::error!("Dropping unreadable queued job {}: {}", id, e),
            }
        }

        Ok(jobs)
    }

    async fn size(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let count: i64 = sync_queue::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to count queue: {}", e)))?;

        Ok(count as usize)
    }

    async fn contains(&self, job_id: Uuid) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        diesel::select(diesel::dsl::exists(
            sync_queue::table.filter(sync_queue::id.eq(job_id)),
        ))
        .get_result(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to look up queued job: {}", e)))
    }

    async fn statistics(&self) -> AppResult<QueueStatistics> {
        let mut conn = self.get_conn()?;

        let by_type: Vec<TypeCount> = diesel::sql_query(
            "SELECT job_type, COUNT(*) AS count FROM sync_queue GROUP BY job_type",
        )
        .load(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to count by type: {}", e)))?;

        let by_priority: Vec<PriorityCount> = diesel::sql_query(
            "SELECT priority, COUNT(*) AS count FROM sync_queue GROUP BY priority",
        )
        .load(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to count by priority: {}", e)))?;

        let bounds: QueueBounds = diesel::sql_query(
            "SELECT COUNT(*) AS total, MIN(created_at) AS oldest, MAX(created_at) AS newest
             FROM sync_queue",
        )
        .get_result(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to read queue bounds: {}", e)))?;

        Ok(QueueStatistics {
            total_queued: bounds.total as usize,
            by_type: by_type
                .into_iter()
                .map(|row| (row.job_type, row.count as usize))
                .collect(),
            by_priority: by_priority
                .into_iter()
                .map(|row| (row.priority, row.count as usize))
                .collect(),
            oldest_job: bounds.oldest,
            newest_job: bounds.newest,
        })
    }

    async fn clear(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let deleted = diesel::delete(sync_queue::table)
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to clear queue: {}", e)))?;

        Ok(deleted)
    }
}
