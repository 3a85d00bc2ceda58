//! Job aggregate root
//!
//! The Job entity wraps one external-process invocation and its tracked
//! lifecycle. All mutations after creation flow through [`JobPatch`] so the
//! store can re-stamp `last_update` on every write.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

/// Job identifier, generated at creation and immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job workload variant, determining the command the manager invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Single-document analysis through the reading pipeline.
    Analyze,
    /// Multi-document syntopical comparison; requires at least two inputs.
    AnalyzeSyntopical,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::AnalyzeSyntopical => "analyze_syntopical",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle status.
///
/// `Stuck` is a terminal state of its own so operators can tell "hung" apart
/// from "broken": it is reached on wall-clock timeout or when the periodic
/// staleness sweep finds a running job whose supervisor stopped updating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Stuck,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Stuck => "stuck",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Stuck
        )
    }

    pub fn can_transition_to(&self, target: &Self) -> bool {
        match (self, target) {
            (Self::Queued, Self::Running) => true,
            (Self::Running, Self::Completed) => true,
            (Self::Running, Self::Failed) => true,
            (Self::Running, Self::Cancelled) => true,
            (Self::Running, Self::Stuck) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate input file paths for a job kind.
///
/// Enforced at the API/CLI boundary before any job record is persisted.
pub fn validate_inputs(kind: JobKind, file_paths: &[String]) -> DomainResult<()> {
    if file_paths.is_empty() {
        return Err(DomainError::Validation(
            "at least one file path required".to_string(),
        ));
    }
    if kind == JobKind::AnalyzeSyntopical && file_paths.len() < 2 {
        return Err(DomainError::Validation(
            "at least two file paths required for syntopical analysis".to_string(),
        ));
    }
    Ok(())
}

/// Job entity persisted in the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub file_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub progress: f64,
    #[serde(default)]
    pub output_files: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Job {
    /// Create a new job in the `Queued` state.
    pub fn new(kind: JobKind, file_paths: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            kind,
            status: JobStatus::Queued,
            file_paths,
            created_at: now,
            started_at: None,
            completed_at: None,
            last_update: now,
            progress: 0.0,
            output_files: Vec::new(),
            error: None,
            log_file: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Explicit partial update applied through the store's single mutation path.
///
/// Absent fields leave the record untouched; the store bumps `last_update`
/// on every merge regardless of which fields are present.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<f64>,
    pub error: Option<String>,
    pub output_files: Option<Vec<String>>,
    pub log_file: Option<PathBuf>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn output_files(mut self, files: Vec<String>) -> Self {
        self.output_files = Some(files);
        self
    }

    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Validate the patch against the current record before merging.
    pub fn validate(&self, current: &Job) -> DomainResult<()> {
        if let Some(progress) = self.progress {
            if !(0.0..=100.0).contains(&progress) {
                return Err(DomainError::Validation(format!(
                    "progress {progress} outside [0, 100]"
                )));
            }
        }
        if let Some(status) = self.status {
            if status != current.status && !current.status.can_transition_to(&status) {
                return Err(DomainError::invalid_state_transition(
                    current.status.as_str(),
                    status.as_str(),
                ));
            }
        }
        Ok(())
    }

    /// Merge the patch into an existing record. `last_update` is the store's
    /// responsibility, not the patch's.
    pub fn apply(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(at) = self.started_at {
            job.started_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            job.completed_at = Some(at);
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(ref error) = self.error {
            job.error = Some(error.clone());
        }
        if let Some(ref files) = self.output_files {
            job.output_files = files.clone();
        }
        if let Some(ref path) = self.log_file {
            job.log_file = Some(path.clone());
        }
    }
}
