/// Status store tests
///
/// Tests cover:
/// - Monotonic transitions
/// - Timestamps stamped from the injected clock
/// - Listing, counting and retention
mod utils;

use reelsync_lib::modules::jobs::domain::{JobStatus, StatusStore, StatusUpdate};
use reelsync_lib::modules::jobs::infrastructure::InMemoryStatusStore;
use reelsync_lib::shared::errors::{AppError, JobError};
use reelsync_lib::shared::utils::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use utils::factories::{epoch, JobFactory};

fn store() -> (InMemoryStatusStore, ManualClock) {
    let clock = ManualClock::new(epoch());
    (InMemoryStatusStore::new(Arc::new(clock.clone())), clock)
}

#[tokio::test]
async fn completed_job_cannot_go_back_to_queued() {
    let (store, _clock) = store();
    let job = JobFactory::movie(1).build();
    store.create(&job).await.unwrap();

    store
        .transition(job.id(), JobStatus::Processing, StatusUpdate::default())
        .await
        .unwrap();
    store
        .transition(
            job.id(),
            JobStatus::Completed,
            StatusUpdate::completed(Duration::from_millis(120)),
        )
        .await
        .unwrap();

    let result = store
        .transition(job.id(), JobStatus::Queued, StatusUpdate::default())
        .await;
    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));

    let record = store.get(job.id()).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
}

#[tokio::test]
async fn queued_cannot_skip_processing() {
    let (store, _clock) = store();
    let job = JobFactory::movie(1).build();
    store.create(&job).await.unwrap();

    let result = store
        .transition(
            job.id(),
            JobStatus::Completed,
            StatusUpdate::completed(Duration::from_millis(1)),
        )
        .await;
    assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    assert_eq!(store.get(job.id()).await.unwrap().status, JobStatus::Queued);
}

#[tokio::test]
async fn transitions_stamp_clock_time() {
    let (store, clock) = store();
    let job = JobFactory::movie(1).build();
    store.create(&job).await.unwrap();

    clock.advance(chrono::Duration::seconds(10));
    store
        .transition(job.id(), JobStatus::Processing, StatusUpdate::default())
        .await
        .unwrap();

    clock.advance(chrono::Duration::seconds(5));
    let record = store
        .transition(
            job.id(),
            JobStatus::Failed,
            StatusUpdate::failed(Some(Duration::from_secs(5)), JobError::new("HTTP 503")),
        )
        .await
        .unwrap();

    assert_eq!(record.queued_at, epoch());
    assert_eq!(record.started_at, Some(epoch() + chrono::Duration::seconds(10)));
    assert_eq!(record.failed_at, Some(epoch() + chrono::Duration::seconds(15)));
    assert_eq!(record.completed_at, None);
    assert_eq!(record.execution_time, Some(Duration::from_secs(5)));
    assert_eq!(record.error.as_ref().map(|e| e.message.as_str()), Some("HTTP 503"));
    assert_eq!(record.updated_at, epoch() + chrono::Duration::seconds(15));
    assert_eq!(record.job_snapshot, job);
}

#[tokio::test]
async fn duplicate_create_is_rejected() {
    let (store, _clock) = store();
    let job = JobFactory::movie(1).build();

    store.create(&job).await.unwrap();
    assert!(store.create(&job).await.is_err());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let (store, _clock) = store();
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(store.get(missing).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        store
            .transition(missing, JobStatus::Processing, StatusUpdate::default())
            .await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn list_and_count_by_status() {
    let (store, _clock) = store();
    let jobs: Vec<_> = (0..4).map(|i| JobFactory::movie(i).build()).collect();
    for job in &jobs {
        store.create(job).await.unwrap();
    }
    store
        .transition(jobs[0].id(), JobStatus::Processing, StatusUpdate::default())
        .await
        .unwrap();

    let queued = store.list_by_status(JobStatus::Queued).await.unwrap();
    assert_eq!(queued.len(), 3);

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.queued, 3);
    assert_eq!(counts.processing, 1);
    assert_eq!(counts.total(), 4);
}

#[tokio::test]
async fn retention_keeps_live_records_regardless_of_age() {
    let (store, clock) = store();
    let job = JobFactory::movie(1).build();
    store.create(&job).await.unwrap();

    clock.advance(chrono::Duration::days(60));
    let deleted = store
        .delete_older_than(Duration::from_secs(30 * 24 * 60 * 60))
        .await
        .unwrap();

    assert_eq!(deleted, 0);
    assert!(store.get(job.id()).await.is_ok());
}
