/// Postgres store tests - database operations
///
/// Tests cover:
/// - Priority ordering and atomic dequeue
/// - Status transitions under a row lock
/// - Retention
/// - Trigger fire claims
///
/// Each test returns early unless TEST_DATABASE_URL is set.
mod utils;

use reelsync_lib::modules::jobs::domain::{JobQueue, JobStatus, StatusStore, StatusUpdate};
use reelsync_lib::modules::jobs::infrastructure::{PgJobQueue, PgStatusStore};
use reelsync_lib::modules::scheduler::{PgTriggerStateStore, TriggerStateStore};
use reelsync_lib::shared::errors::{AppError, JobError};
use reelsync_lib::shared::utils::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use utils::db;
use utils::factories::{epoch, JobFactory};

macro_rules! require_db {
    () => {
        match db::get_test_db_pool() {
            Some(pool) => pool,
            None => {
                eprintln!("TEST_DATABASE_URL not set; skipping");
                return;
            }
        }
    };
}

#[tokio::test]
async fn dequeue_orders_by_priority_then_age() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let queue = PgJobQueue::new((*pool).clone());
    let low = JobFactory::movie(1).with_priority(10).build();
    let high = JobFactory::movie(2).with_priority(1).build();
    let mid_old = JobFactory::movie(3).with_priority(5).created_after(-60).build();
    let mid_new = JobFactory::movie(4).with_priority(5).build();

    for job in [&low, &high, &mid_new, &mid_old] {
        queue.enqueue(job.clone()).await.unwrap();
    }

    let batch = queue.dequeue_batch(3).await.unwrap();
    let ids: Vec<_> = batch.iter().map(|job| job.id()).collect();
    assert_eq!(ids, vec![high.id(), mid_old.id(), mid_new.id()]);
    assert_eq!(batch[0], high);

    assert_eq!(queue.size().await.unwrap(), 1);
    let stats = queue.statistics().await.unwrap();
    assert_eq!(stats.total_queued, 1);
    assert_eq!(stats.by_priority.get(&10), Some(&1));
}

#[tokio::test]
async fn concurrent_dequeues_split_the_queue() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let queue = Arc::new(PgJobQueue::new((*pool).clone()));
    for i in 0..20 {
        queue.enqueue(JobFactory::movie(i).build()).await.unwrap();
    }

    let (a, b) = tokio::join!(queue.dequeue_batch(10), queue.dequeue_batch(10));
    let mut ids: Vec<_> = a
        .unwrap()
        .into_iter()
        .chain(b.unwrap())
        .map(|job| job.id())
        .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();

    assert_eq!(total, 20);
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn status_lifecycle_round_trips() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let clock = ManualClock::new(epoch());
    let store = PgStatusStore::new((*pool).clone(), Arc::new(clock.clone()));
    let job = JobFactory::tv(1399).build();

    store.create(&job).await.unwrap();
    clock.advance(chrono::Duration::seconds(3));
    store
        .transition(job.id(), JobStatus::Processing, StatusUpdate::default())
        .await
        .unwrap();
    clock.advance(chrono::Duration::seconds(2));
    store
        .transition(
            job.id(),
            JobStatus::Failed,
            StatusUpdate::failed(Some(Duration::from_millis(1500)), JobError::new("HTTP 429")),
        )
        .await
        .unwrap();

    let record = store.get(job.id()).await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.started_at, Some(epoch() + chrono::Duration::seconds(3)));
    assert_eq!(record.failed_at, Some(epoch() + chrono::Duration::seconds(5)));
    assert_eq!(record.execution_time, Some(Duration::from_millis(1500)));
    assert_eq!(record.error.unwrap().message, "HTTP 429");
    assert_eq!(record.job_snapshot, job);

    let result = store
        .transition(job.id(), JobStatus::Queued, StatusUpdate::default())
        .await;
    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    assert_eq!(store.get(job.id()).await.unwrap().status, JobStatus::Failed);

    let failed = store.list_by_status(JobStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(store.counts().await.unwrap().failed, 1);
}

#[tokio::test]
async fn retention_deletes_old_terminal_rows() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let clock = ManualClock::new(epoch() - chrono::Duration::days(31));
    let store = PgStatusStore::new((*pool).clone(), Arc::new(clock.clone()));

    let old = JobFactory::movie(1).build();
    let live = JobFactory::movie(2).build();
    store.create(&old).await.unwrap();
    store.create(&live).await.unwrap();
    store
        .transition(old.id(), JobStatus::Processing, StatusUpdate::default())
        .await
        .unwrap();
    store
        .transition(
            old.id(),
            JobStatus::Completed,
            StatusUpdate::completed(Duration::from_millis(10)),
        )
        .await
        .unwrap();

    clock.set(epoch());
    let deleted = store
        .delete_older_than(Duration::from_secs(30 * 24 * 60 * 60))
        .await
        .unwrap();

    assert_eq!(deleted, 1);
    assert!(matches!(store.get(old.id()).await, Err(AppError::NotFound(_))));
    assert!(store.get(live.id()).await.is_ok());
}

#[tokio::test]
async fn contains_tracks_queue_membership() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let queue = PgJobQueue::new((*pool).clone());
    let job = JobFactory::movie(1).build();
    queue.enqueue(job.clone()).await.unwrap();

    assert!(queue.contains(job.id()).await.unwrap());
    queue.dequeue_batch(1).await.unwrap();
    assert!(!queue.contains(job.id()).await.unwrap());
}

#[tokio::test]
async fn trigger_claims_hold_across_store_instances() {
    let pool = require_db!();
    let _guard = db::acquire_test_lock();
    db::clean_test_db(&pool);

    let hour = Duration::from_secs(3600);
    let first = PgTriggerStateStore::new((*pool).clone());
    let second = PgTriggerStateStore::new((*pool).clone());

    assert!(first.claim("recent_activity", epoch(), hour).await.unwrap());
    assert!(!second.claim("recent_activity", epoch(), hour).await.unwrap());

    let half_hour = epoch() + chrono::Duration::minutes(30);
    assert!(!second.claim("recent_activity", half_hour, hour).await.unwrap());
    assert_eq!(
        second.last_fired("recent_activity").await.unwrap(),
        Some(epoch())
    );

    let next_hour = epoch() + chrono::Duration::hours(1);
    assert!(second.claim("recent_activity", next_hour, hour).await.unwrap());

    first.record_fired("cleanup", half_hour).await.unwrap();
    assert_eq!(second.last_fired("cleanup").await.unwrap(), Some(half_hour));
    assert_eq!(second.last_fired("unknown").await.unwrap(), None);
}
