//! Data transfer objects for the admin API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use folio_core::Job;
use folio_store::JobCounts;

// --- Jobs ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobDto {
    pub job_id: Uuid,
    pub job_type: String,
    pub status: String,
    pub file_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    /// Heuristic completion percentage in [0, 100]
    pub progress: f64,
    pub output_files: Vec<String>,
    pub error: Option<String>,
    pub log_file: Option<String>,
}

impl From<Job> for JobDto {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id.as_uuid(),
            job_type: job.kind.as_str().to_string(),
            status: job.status.as_str().to_string(),
            file_paths: job.file_paths,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            last_update: job.last_update,
            progress: job.progress,
            output_files: job.output_files,
            error: job.error,
            log_file: job.log_file.map(|p| p.display().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobListDto {
    pub jobs: Vec<JobDto>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    /// File paths to process; analyze-syntopical requires at least two
    pub file_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelJobResponseDto {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

// --- System status ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemStatusDto {
    pub total_jobs: usize,
    pub queued_jobs: usize,
    pub running_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub cancelled_jobs: usize,
    pub stuck_jobs: usize,
}

impl From<JobCounts> for SystemStatusDto {
    fn from(counts: JobCounts) -> Self {
        Self {
            total_jobs: counts.total,
            queued_jobs: counts.queued,
            running_jobs: counts.running,
            completed_jobs: counts.completed,
            failed_jobs: counts.failed,
            cancelled_jobs: counts.cancelled,
            stuck_jobs: counts.stuck,
        }
    }
}

// --- Upload ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadResponseDto {
    pub filename: String,
    pub file_path: String,
    pub size: usize,
    pub message: String,
}

// --- Health ---

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{JobKind, JobStatus};

    #[test]
    fn test_job_dto_from_entity() {
        let mut job = Job::new(JobKind::AnalyzeSyntopical, vec!["a.epub".into(), "b.epub".into()]);
        job.status = JobStatus::Running;
        job.progress = 42.0;
        job.log_file = Some("logs/job.log".into());

        let dto = JobDto::from(job.clone());
        assert_eq!(dto.job_id, job.id.as_uuid());
        assert_eq!(dto.job_type, "analyze_syntopical");
        assert_eq!(dto.status, "running");
        assert_eq!(dto.progress, 42.0);
        assert_eq!(dto.log_file.as_deref(), Some("logs/job.log"));
    }
}
