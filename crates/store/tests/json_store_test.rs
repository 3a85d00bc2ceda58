//! Job store integration tests against a real filesystem document.

use std::sync::Arc;

use chrono::{Duration, Utc};

use folio_core::{Job, JobId, JobKind, JobPatch, JobStatus};
use folio_store::{JobLogger, JsonJobStore, StoreError};

fn analyze_job() -> Job {
    Job::new(JobKind::Analyze, vec!["book.epub".to_string()])
}

#[tokio::test]
async fn test_create_then_get_round_trips_all_fields() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    let job = Job::new(
        JobKind::AnalyzeSyntopical,
        vec!["a.epub".to_string(), "b.epub".to_string()],
    );
    let created = store.create(job.clone()).await.unwrap();
    assert_eq!(created, job);

    let fetched = store.get(&job.id).await.unwrap();
    assert_eq!(fetched, job);
}

#[tokio::test]
async fn test_create_rejects_duplicate_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    let job = analyze_job();
    store.create(job.clone()).await.unwrap();

    match store.create(job.clone()).await {
        Err(StoreError::DuplicateId(id)) => assert_eq!(id, job.id),
        other => panic!("expected DuplicateId, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_absent_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    assert!(store.get(&JobId::new()).await.is_none());
}

#[tokio::test]
async fn test_update_absent_returns_none_without_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();
    store.create(analyze_job()).await.unwrap();

    let before = tokio::fs::read_to_string(store.jobs_file()).await.unwrap();
    let result = store
        .update(&JobId::new(), JobPatch::new().progress(50.0))
        .await
        .unwrap();
    assert!(result.is_none());

    let after = tokio::fs::read_to_string(store.jobs_file()).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_update_merges_and_bumps_last_update() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();
    let job = store.create(analyze_job()).await.unwrap();

    let updated = store
        .update(
            &job.id,
            JobPatch::new()
                .status(JobStatus::Running)
                .started_at(Utc::now()),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, JobStatus::Running);
    assert!(updated.started_at.is_some());
    assert!(updated.last_update > job.last_update);
    // Untouched fields survive the merge.
    assert_eq!(updated.file_paths, job.file_paths);
    assert_eq!(updated.created_at, job.created_at);
}

#[tokio::test]
async fn test_update_enforces_state_machine() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();
    let job = store.create(analyze_job()).await.unwrap();

    // Queued cannot jump straight to Completed.
    let result = store
        .update(&job.id, JobPatch::new().status(JobStatus::Completed))
        .await;
    assert!(matches!(result, Err(StoreError::Domain(_))));

    let current = store.get(&job.id).await.unwrap();
    assert_eq!(current.status, JobStatus::Queued);
}

#[tokio::test]
async fn test_list_filters_sorts_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let mut job = analyze_job();
        job.created_at = Utc::now() - Duration::minutes(10 - i);
        ids.push(job.id);
        store.create(job).await.unwrap();
    }
    // Move the two oldest to Running.
    for id in &ids[..2] {
        store
            .update(id, JobPatch::new().status(JobStatus::Running))
            .await
            .unwrap();
    }

    let all = store.list(None, None).await;
    assert_eq!(all.len(), 5);
    for window in all.windows(2) {
        assert!(window[0].created_at >= window[1].created_at);
    }

    let running = store.list(Some(JobStatus::Running), None).await;
    assert_eq!(running.len(), 2);
    assert!(running.iter().all(|job| job.status == JobStatus::Running));

    let limited = store.list(None, Some(3)).await;
    assert_eq!(limited.len(), 3);
    // Limit truncates after sorting: newest three survive.
    assert_eq!(limited[0].id, ids[4]);
}

#[tokio::test]
async fn test_counts_tallies_per_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    for _ in 0..3 {
        store.create(analyze_job()).await.unwrap();
    }
    let running = store.create(analyze_job()).await.unwrap();
    store
        .update(&running.id, JobPatch::new().status(JobStatus::Running))
        .await
        .unwrap();

    let counts = store.counts().await;
    assert_eq!(counts.total, 4);
    assert_eq!(counts.queued, 3);
    assert_eq!(counts.running, 1);
    assert_eq!(counts.completed, 0);
}

#[tokio::test]
async fn test_corrupt_document_reads_as_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();
    store.create(analyze_job()).await.unwrap();

    tokio::fs::write(store.jobs_file(), "{not json at all")
        .await
        .unwrap();

    assert!(store.list(None, None).await.is_empty());
    // The store keeps working after recovery.
    let job = store.create(analyze_job()).await.unwrap();
    assert!(store.get(&job.id).await.is_some());
}

#[tokio::test]
async fn test_sweep_deletes_old_jobs_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonJobStore::open(dir.path()).await.unwrap();

    let logger = JobLogger::create(dir.path().join("logs"), JobId::new())
        .await
        .unwrap();
    logger.append("old job output").await.unwrap();

    let mut old = analyze_job();
    old.created_at = Utc::now() - Duration::days(40);
    old.log_file = Some(logger.path().to_path_buf());
    let old_id = old.id;
    store.create(old).await.unwrap();

    // A second old job whose log file is already gone: sweep keeps going.
    let mut orphan = analyze_job();
    orphan.created_at = Utc::now() - Duration::days(35);
    orphan.log_file = Some(dir.path().join("logs").join("missing.log"));
    store.create(orphan).await.unwrap();

    let fresh = store.create(analyze_job()).await.unwrap();

    let deleted = store.sweep(Utc::now() - Duration::days(30)).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(store.get(&old_id).await.is_none());
    assert!(store.get(&fresh.id).await.is_some());
    assert!(!logger.path().exists());
}

#[tokio::test]
async fn test_concurrent_updates_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonJobStore::open(dir.path()).await.unwrap());

    let mut ids = Vec::new();
    for _ in 0..50 {
        let job = store.create(analyze_job()).await.unwrap();
        ids.push(job.id);
    }

    let mut handles = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let store = Arc::clone(&store);
        let id = *id;
        let progress = (i % 100) as f64;
        handles.push(tokio::spawn(async move {
            store
                .update(&id, JobPatch::new().progress(progress))
                .await
                .unwrap()
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for (i, id) in ids.iter().enumerate() {
        let job = store.get(id).await.unwrap();
        assert_eq!(job.progress, (i % 100) as f64, "job {id} lost its update");
    }
}
