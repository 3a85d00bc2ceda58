//! Lifecycle manager integration tests.
//!
//! Each test stands in a scripted fake pipeline for the real orchestrator
//! CLI so supervision, timeout and cancellation run against live processes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use folio_core::{Job, JobId, JobKind, JobStatus};
use folio_manager::{JobManager, ManagerConfig};
use folio_store::JsonJobStore;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-pipeline.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

async fn manager_with_script(
    dir: &Path,
    body: &str,
    timeout: Duration,
) -> (Arc<JobManager>, Arc<JsonJobStore>) {
    let store = Arc::new(JsonJobStore::open(dir.join("data")).await.unwrap());
    let config = ManagerConfig {
        cli_path: write_script(dir, body),
        workdir: dir.to_path_buf(),
        log_dir: dir.join("logs"),
        timeout,
    };
    let manager = Arc::new(JobManager::new(Arc::clone(&store), config));
    (manager, store)
}

async fn wait_for_terminal(store: &JsonJobStore, id: &JobId, secs: u64) -> Job {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        if let Some(job) = store.get(id).await {
            if job.is_terminal() {
                return job;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {id} did not reach a terminal state in {secs}s"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_successful_process_completes_with_full_progress() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = manager_with_script(
        dir.path(),
        "echo 'starting pipeline'\necho 'Analyzing chapter 5/10'\nexit 0",
        Duration::from_secs(30),
    )
    .await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(manager.start(&job.id).await);

    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100.0);
    assert!(done.completed_at.is_some());
    assert!(done.error.is_none());

    // Output lines were captured into the job log.
    let log_file = done.log_file.expect("log file recorded");
    let content = tokio::fs::read_to_string(&log_file).await.unwrap();
    assert!(content.contains("Analyzing chapter 5/10"));

    assert!(!manager.is_supervising(&job.id).await);
}

#[tokio::test]
async fn test_nonzero_exit_marks_failed_with_code() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = manager_with_script(
        dir.path(),
        "echo 'starting'\nexit 1",
        Duration::from_secs(30),
    )
    .await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);

    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.completed_at.is_some());
    assert!(done.error.unwrap().contains('1'));
}

#[tokio::test]
async fn test_stderr_is_captured_too() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = manager_with_script(
        dir.path(),
        "echo 'warning: fallback parser' >&2\nexit 0",
        Duration::from_secs(30),
    )
    .await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);

    let done = wait_for_terminal(&store, &job.id, 10).await;
    let content = tokio::fs::read_to_string(done.log_file.unwrap())
        .await
        .unwrap();
    assert!(content.contains("fallback parser"));
}

#[tokio::test]
async fn test_timeout_kills_process_and_marks_stuck() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = manager_with_script(
        dir.path(),
        "sleep 30",
        Duration::from_millis(300),
    )
    .await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);

    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert_eq!(done.status, JobStatus::Stuck);
    assert!(done.completed_at.is_some());
    assert!(done.error.unwrap().contains("timed out"));
    assert!(!manager.is_supervising(&job.id).await);
}

#[tokio::test]
async fn test_progress_tracked_from_output_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) = manager_with_script(
        dir.path(),
        "echo 'Analyzing chapter 5/10'\nsleep 30",
        Duration::from_secs(60),
    )
    .await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = store.get(&job.id).await.unwrap();
        if current.progress == 50.0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "progress never reached 50, job: {current:?}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(manager.cancel(&job.id).await);
}

#[tokio::test]
async fn test_cancel_running_job() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) =
        manager_with_script(dir.path(), "sleep 30", Duration::from_secs(60)).await;

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);

    // Give the supervisor time to spawn the process.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(manager.cancel(&job.id).await);

    let cancelled = store.get(&job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());
    assert!(!manager.is_supervising(&job.id).await);

    // A second cancel finds a terminal job.
    assert!(!manager.cancel(&job.id).await);
}

#[tokio::test]
async fn test_cancel_rejects_non_running_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) =
        manager_with_script(dir.path(), "exit 0", Duration::from_secs(30)).await;

    // Absent job.
    assert!(!manager.cancel(&JobId::new()).await);

    // Queued job: not cancellable through the manager contract.
    let queued = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(!manager.cancel(&queued.id).await);

    // Completed job.
    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);
    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(!manager.cancel(&job.id).await);
    assert_eq!(store.get(&job.id).await.unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn test_start_rejects_absent_and_non_queued() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, store) =
        manager_with_script(dir.path(), "exit 0", Duration::from_secs(30)).await;

    assert!(!manager.start(&JobId::new()).await);

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    assert!(manager.start(&job.id).await);
    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert!(done.is_terminal());

    // Terminal jobs cannot be restarted.
    assert!(!manager.start(&job.id).await);
}

#[tokio::test]
async fn test_spawn_failure_marks_job_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonJobStore::open(dir.path().join("data")).await.unwrap());
    let config = ManagerConfig {
        cli_path: dir.path().join("does-not-exist"),
        workdir: dir.path().to_path_buf(),
        log_dir: dir.path().join("logs"),
        timeout: Duration::from_secs(30),
    };
    let manager = Arc::new(JobManager::new(Arc::clone(&store), config));

    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    // start still succeeds: the spawn failure belongs to supervision.
    assert!(manager.start(&job.id).await);

    let done = wait_for_terminal(&store, &job.id, 10).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.is_some());
}

#[tokio::test]
async fn test_sweep_stuck_marks_stale_running_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonJobStore::open(dir.path().join("data")).await.unwrap());
    let config = ManagerConfig {
        cli_path: dir.path().join("unused"),
        workdir: dir.path().to_path_buf(),
        log_dir: dir.path().join("logs"),
        timeout: Duration::from_millis(100),
    };
    let manager = JobManager::new(Arc::clone(&store), config);

    // A running job whose supervisor died: the record says Running but
    // nothing updates it anymore.
    let job = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    store
        .update(&job.id, folio_core::JobPatch::new().status(JobStatus::Running))
        .await
        .unwrap();

    // Not yet stale.
    assert_eq!(manager.sweep_stuck().await, 0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(manager.sweep_stuck().await, 1);

    let stuck = store.get(&job.id).await.unwrap();
    assert_eq!(stuck.status, JobStatus::Stuck);
    assert!(stuck.completed_at.is_some());
    assert!(stuck.error.unwrap().contains("no progress update"));

    // Queued jobs are never swept.
    let queued = manager
        .create(JobKind::Analyze, vec!["book.epub".to_string()])
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(manager.sweep_stuck().await, 0);
    assert_eq!(store.get(&queued.id).await.unwrap().status, JobStatus::Queued);
}
