//! Folio job lifecycle manager
//!
//! Creates jobs, launches and supervises the external analysis processes,
//! feeds their output through the progress heuristic, and enforces both
//! the per-job wall-clock timeout and the periodic staleness sweep.
//!
//! Anything that can be attributed to one job lands on that job's record;
//! supervision never propagates errors to the caller of `start`/`cancel`.

pub mod registry;

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use folio_core::{Job, JobId, JobKind, JobPatch, JobStatus, estimate};
use folio_store::{JobLogger, JsonJobStore, StoreError};

pub use crate::registry::{ProcessHandle, SupervisionRegistry};

/// Manager error type. Surfaces only from `create`; supervision failures
/// are recorded on the job instead.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Path to the orchestrator CLI the manager invokes per job.
    pub cli_path: PathBuf,
    /// Working directory for spawned processes (the project root).
    pub workdir: PathBuf,
    /// Directory for per-job log files.
    pub log_dir: PathBuf,
    /// Wall-clock timeout per job, also the staleness threshold for
    /// `sweep_stuck`.
    pub timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cli_path: PathBuf::from("./folio"),
            workdir: PathBuf::from("."),
            log_dir: PathBuf::from("./logs"),
            timeout: Duration::from_secs(1800),
        }
    }
}

/// Job lifecycle manager.
pub struct JobManager {
    store: Arc<JsonJobStore>,
    registry: SupervisionRegistry,
    config: ManagerConfig,
}

impl JobManager {
    pub fn new(store: Arc<JsonJobStore>, config: ManagerConfig) -> Self {
        Self {
            store,
            registry: SupervisionRegistry::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<JsonJobStore> {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Persist a new queued job. Input-count validation happens at the
    /// API/CLI boundary before this is called.
    pub async fn create(&self, kind: JobKind, file_paths: Vec<String>) -> Result<Job, ManagerError> {
        let job = Job::new(kind, file_paths);
        info!("created job {} ({})", job.id, job.kind);
        Ok(self.store.create(job).await?)
    }

    /// Start executing a queued job.
    ///
    /// Returns false when the job is absent or not queued; a failed start
    /// leaves the record queued.
    pub async fn start(self: &Arc<Self>, id: &JobId) -> bool {
        let Some(job) = self.store.get(id).await else {
            return false;
        };
        if job.status != JobStatus::Queued {
            return false;
        }

        let patch = JobPatch::new()
            .status(JobStatus::Running)
            .started_at(Utc::now());
        match self.store.update(id, patch).await {
            Ok(Some(_)) => {}
            Ok(None) => return false,
            Err(e) => {
                error!("failed to mark job {id} running: {e}");
                return false;
            }
        }

        let manager = Arc::clone(self);
        let job_id = *id;
        let task = tokio::spawn(async move {
            manager.supervise(job_id).await;
        });
        self.registry.register_task(*id, task).await;
        true
    }

    /// Cancel a running job: kill the tracked process, await the
    /// supervising task's settlement, then persist the cancellation.
    pub async fn cancel(&self, id: &JobId) -> bool {
        let Some(job) = self.store.get(id).await else {
            return false;
        };
        if job.status != JobStatus::Running {
            return false;
        }

        if let Some(handle) = self.registry.process(id).await {
            if let Err(e) = handle.kill().await {
                warn!("failed to kill process for job {id}: {e}");
            }
        }
        if let Some(task) = self.registry.take_task(id).await {
            task.abort();
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("supervising task for job {id} panicked: {e}"),
            }
        }
        self.registry.remove(id).await;

        let patch = JobPatch::new()
            .status(JobStatus::Cancelled)
            .completed_at(Utc::now());
        match self.store.update(id, patch).await {
            Ok(Some(_)) => {
                info!("job {id} cancelled");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("failed to persist cancellation of job {id}: {e}");
                false
            }
        }
    }

    /// Mark running jobs whose `last_update` went stale as stuck.
    ///
    /// Catches jobs whose supervising task died without reaching a
    /// terminal transition; per-job timeouts are enforced separately
    /// during supervision. Returns how many jobs were marked.
    pub async fn sweep_stuck(&self) -> usize {
        let threshold = chrono::Duration::from_std(self.config.timeout)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let mut marked = 0;
        for job in self.store.list(Some(JobStatus::Running), None).await {
            let stale_for = Utc::now() - job.last_update;
            if stale_for <= threshold {
                continue;
            }
            let patch = JobPatch::new()
                .status(JobStatus::Stuck)
                .completed_at(Utc::now())
                .error(format!(
                    "no progress update for {} seconds",
                    self.config.timeout.as_secs()
                ));
            match self.store.update(&job.id, patch).await {
                Ok(Some(_)) => {
                    warn!("job {} marked stuck after staleness sweep", job.id);
                    marked += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("failed to mark job {} stuck: {e}", job.id),
            }
        }
        marked
    }

    pub async fn is_supervising(&self, id: &JobId) -> bool {
        self.registry.is_supervising(id).await
    }

    /// Command vector for a job's kind, inputs appended.
    fn build_command(&self, job: &Job) -> Vec<String> {
        let subcommand = match job.kind {
            JobKind::Analyze => "analyze",
            JobKind::AnalyzeSyntopical => "analyze-syntopical",
        };
        let mut command = vec![
            self.config.cli_path.display().to_string(),
            subcommand.to_string(),
        ];
        command.extend(job.file_paths.iter().cloned());
        command
    }

    /// Supervision entry point: everything attributable to the job is
    /// recorded on it, and registry cleanup is unconditional.
    async fn supervise(&self, id: JobId) {
        if let Err(e) = self.run_supervised(&id).await {
            error!("job {id} failed during orchestration: {e}");
            let patch = JobPatch::new()
                .status(JobStatus::Failed)
                .completed_at(Utc::now())
                .error(e.to_string());
            if let Err(e) = self.store.update(&id, patch).await {
                error!("failed to record orchestration failure for job {id}: {e}");
            }
        }
        self.registry.remove(&id).await;
    }

    async fn run_supervised(&self, id: &JobId) -> Result<(), ManagerError> {
        let Some(job) = self.store.get(id).await else {
            return Ok(());
        };

        let logger = JobLogger::create(&self.config.log_dir, *id).await?;
        self.store
            .update(id, JobPatch::new().log_file(logger.path().to_path_buf()))
            .await?;
        logger
            .append(&format!("starting job - kind: {}", job.kind))
            .await?;
        logger
            .append(&format!("files: {}", job.file_paths.join(", ")))
            .await?;

        let command = self.build_command(&job);
        logger
            .append(&format!("executing command: {}", command.join(" ")))
            .await?;
        info!("job {id}: executing {:?}", command);

        let mut child = Command::new(&command[0])
            .args(&command[1..])
            .current_dir(&self.config.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let handle = ProcessHandle::new(child);
        self.registry.register_process(*id, handle.clone()).await;

        let supervised = async {
            tokio::join!(
                self.drain_stream(id, &logger, stdout),
                self.drain_stream(id, &logger, stderr),
            );
            handle.wait().await
        };

        match tokio::time::timeout(self.config.timeout, supervised).await {
            Ok(Ok(Some(status))) if status.success() => {
                logger.append("job completed successfully").await.ok();
                info!("job {id} completed");
                let patch = JobPatch::new()
                    .status(JobStatus::Completed)
                    .completed_at(Utc::now())
                    .progress(100.0);
                self.store.update(id, patch).await?;
            }
            Ok(Ok(Some(status))) => {
                let describe = match status.code() {
                    Some(code) => format!("process exited with code {code}"),
                    None => "process terminated by signal".to_string(),
                };
                logger.append(&format!("job failed: {describe}")).await.ok();
                error!("job {id} failed: {describe}");
                let patch = JobPatch::new()
                    .status(JobStatus::Failed)
                    .completed_at(Utc::now())
                    .error(describe);
                self.store.update(id, patch).await?;
            }
            Ok(Ok(None)) => {
                // Reaped elsewhere: cancellation owns the terminal write.
                info!("job {id} process reaped during cancellation");
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                let describe = format!(
                    "job timed out after {:.1} seconds",
                    self.config.timeout.as_secs_f64()
                );
                logger.append(&describe).await.ok();
                error!("job {id}: {describe}");
                if let Err(e) = handle.kill().await {
                    warn!("failed to kill timed-out process for job {id}: {e}");
                }
                let patch = JobPatch::new()
                    .status(JobStatus::Stuck)
                    .completed_at(Utc::now())
                    .error(describe);
                self.store.update(id, patch).await?;
            }
        }

        Ok(())
    }

    /// Drain one output stream line by line into the job log, feeding each
    /// line to the progress heuristic.
    async fn drain_stream<R>(&self, id: &JobId, logger: &JobLogger, stream: Option<R>)
    where
        R: AsyncRead + Unpin,
    {
        let Some(stream) = stream else {
            return;
        };
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Err(e) = logger.append(line.trim_end()).await {
                warn!("failed to append to log of job {id}: {e}");
            }
            let Some(job) = self.store.get(id).await else {
                continue;
            };
            if let Some(progress) = estimate(&job, &line) {
                if let Err(e) = self
                    .store
                    .update(id, JobPatch::new().progress(progress))
                    .await
                {
                    warn!("failed to persist progress for job {id}: {e}");
                }
            }
        }
    }
}
