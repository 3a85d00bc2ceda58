//! JSON-document job store
//!
//! All jobs live in a single `jobs.json` document keyed by job id. Every
//! access is a read-modify-write of the whole document behind one writer
//! lock: concurrent supervisors updating different jobs would otherwise
//! drop each other's writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use folio_core::{DomainError, Job, JobId, JobPatch, JobStatus};

/// Store error type. Corruption of the underlying document is not an
/// error at this layer; it reads as an empty store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job {0} already exists")]
    DuplicateId(JobId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-status job tally over the full store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub total: usize,
    pub queued: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub stuck: usize,
}

type JobMap = HashMap<JobId, Job>;

/// Whole-document JSON job store.
pub struct JsonJobStore {
    jobs_file: PathBuf,
    /// Serializes every read→merge→write cycle. Readers take it too so they
    /// never observe a half-written document.
    lock: Mutex<()>,
}

impl JsonJobStore {
    /// Open (or initialize) a store under `storage_dir`.
    pub async fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref();
        tokio::fs::create_dir_all(storage_dir).await?;
        let jobs_file = storage_dir.join("jobs.json");
        if !tokio::fs::try_exists(&jobs_file).await.unwrap_or(false) {
            tokio::fs::write(&jobs_file, "{}").await?;
        }
        Ok(Self {
            jobs_file,
            lock: Mutex::new(()),
        })
    }

    pub fn jobs_file(&self) -> &Path {
        &self.jobs_file
    }

    fn load(&self) -> JobMap {
        let raw = match std::fs::read_to_string(&self.jobs_file) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("jobs file unreadable, treating store as empty: {e}");
                return JobMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("jobs file corrupt, treating store as empty: {e}");
                JobMap::new()
            }
        }
    }

    // Synchronous write: supervising tasks can be aborted at await points,
    // and a half-written document must never be observable.
    fn persist(&self, jobs: &JobMap) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(jobs)?;
        std::fs::write(&self.jobs_file, raw)?;
        Ok(())
    }

    /// Insert a new job record. Fails when the id is already present.
    pub async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::DuplicateId(job.id));
        }
        jobs.insert(job.id, job.clone());
        self.persist(&jobs)?;
        Ok(job)
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        let _guard = self.lock.lock().await;
        self.load().get(id).cloned()
    }

    /// Merge a partial update into an existing record and re-stamp
    /// `last_update`. This is the only mutation path for persisted jobs.
    ///
    /// Returns `Ok(None)` when the id is absent; the store is untouched.
    pub async fn update(&self, id: &JobId, patch: JobPatch) -> Result<Option<Job>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load();
        let Some(job) = jobs.get_mut(id) else {
            return Ok(None);
        };
        patch.validate(job)?;
        patch.apply(job);
        job.last_update = Utc::now();
        let updated = job.clone();
        self.persist(&jobs)?;
        Ok(Some(updated))
    }

    /// List jobs, newest first, optionally filtered by exact status and
    /// truncated after sorting.
    pub async fn list(&self, status: Option<JobStatus>, limit: Option<usize>) -> Vec<Job> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<Job> = self
            .load()
            .into_values()
            .filter(|job| status.is_none_or(|s| job.status == s))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        jobs
    }

    /// Tally jobs per status over the full unfiltered set.
    pub async fn counts(&self) -> JobCounts {
        let _guard = self.lock.lock().await;
        let jobs = self.load();
        let mut counts = JobCounts {
            total: jobs.len(),
            ..JobCounts::default()
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
                JobStatus::Stuck => counts.stuck += 1,
            }
        }
        counts
    }

    /// Delete every job created before the cutoff, removing its log file
    /// when present. Log deletion is best-effort and never aborts the sweep.
    pub async fn sweep(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load();
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| job.created_at < older_than)
            .map(|job| job.id)
            .collect();
        for id in &expired {
            if let Some(job) = jobs.remove(id) {
                if let Some(log_file) = job.log_file {
                    if let Err(e) = tokio::fs::remove_file(&log_file).await {
                        warn!("failed to remove log {} for job {id}: {e}", log_file.display());
                    }
                }
            }
        }
        self.persist(&jobs)?;
        Ok(expired.len())
    }
}
