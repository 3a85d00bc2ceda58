//! Job Management REST API Module
//!
//! Create/list/get/cancel endpoints plus the SSE log stream, layered on
//! the lifecycle manager and the job store.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use folio_core::{JobId, JobKind, JobStatus, validate_inputs};
use folio_manager::JobManager;
use folio_store::{JsonJobStore, read_log_from};

use crate::dtos::{
    CancelJobResponseDto, CreateJobRequest, JobDto, JobListDto, SystemStatusDto,
};

const LOG_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1000;

// ===== Application State =====

#[derive(Clone)]
pub struct JobsApiAppState {
    pub manager: Arc<JobManager>,
    pub store: Arc<JsonJobStore>,
}

impl JobsApiAppState {
    pub fn new(manager: Arc<JobManager>) -> Self {
        let store = Arc::clone(manager.store());
        Self { manager, store }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

fn parse_status(raw: &str) -> Option<JobStatus> {
    match raw {
        "queued" => Some(JobStatus::Queued),
        "running" => Some(JobStatus::Running),
        "completed" => Some(JobStatus::Completed),
        "failed" => Some(JobStatus::Failed),
        "cancelled" => Some(JobStatus::Cancelled),
        "stuck" => Some(JobStatus::Stuck),
        _ => None,
    }
}

// ===== API Handlers =====

async fn create_job(
    state: &JobsApiAppState,
    kind: JobKind,
    request: CreateJobRequest,
) -> Result<Json<JobDto>, StatusCode> {
    if let Err(e) = validate_inputs(kind, &request.file_paths) {
        warn!("rejected {kind} job: {e}");
        return Err(StatusCode::BAD_REQUEST);
    }

    let job = match state.manager.create(kind, request.file_paths).await {
        Ok(job) => job,
        Err(e) => {
            error!("failed to create {kind} job: {e}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // The manager owns the supervision task; this only requests the start.
    let id = job.id;
    if !state.manager.start(&id).await {
        error!("failed to start job {id}");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    info!("job {id} created and started");
    let started = state.store.get(&id).await.unwrap_or(job);
    Ok(Json(started.into()))
}

/// Create a single-document analysis job.
#[utoipa::path(
    post,
    path = "/api/jobs/analyze",
    request_body = CreateJobRequest,
    responses(
        (status = 200, description = "Job created and started", body = JobDto),
        (status = 400, description = "At least one file path required"),
    ),
    tag = "jobs"
)]
pub async fn create_analyze_job_handler(
    State(state): State<JobsApiAppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<JobDto>, StatusCode> {
    create_job(&state, JobKind::Analyze, request).await
}

/// Create a multi-document syntopical comparison job.
#[utoipa::path(
    post,
    path = "/api/jobs/analyze-syntopical",
    request_body = CreateJobRequest,
    responses(
        (status = 200, description = "Job created and started", body = JobDto),
        (status = 400, description = "At least two file paths required"),
    ),
    tag = "jobs"
)]
pub async fn create_syntopical_job_handler(
    State(state): State<JobsApiAppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<Json<JobDto>, StatusCode> {
    create_job(&state, JobKind::AnalyzeSyntopical, request).await
}

/// List jobs, newest first, with optional status filter.
#[utoipa::path(
    get,
    path = "/api/jobs",
    responses(
        (status = 200, description = "Jobs matching the filter", body = JobListDto),
        (status = 400, description = "Unknown status filter"),
    ),
    tag = "jobs"
)]
pub async fn list_jobs_handler(
    State(state): State<JobsApiAppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobListDto>, StatusCode> {
    let status = match query.status.as_deref() {
        Some(raw) => match parse_status(raw) {
            Some(status) => Some(status),
            None => {
                warn!("unknown status filter: {raw}");
                return Err(StatusCode::BAD_REQUEST);
            }
        },
        None => None,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);

    let jobs: Vec<JobDto> = state
        .store
        .list(status, Some(limit))
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    let total = jobs.len();
    Ok(Json(JobListDto { jobs, total }))
}

/// System status: per-status job counts over the full set.
#[utoipa::path(
    get,
    path = "/api/jobs/status",
    responses((status = 200, description = "Per-status job counts", body = SystemStatusDto)),
    tag = "jobs"
)]
pub async fn system_status_handler(
    State(state): State<JobsApiAppState>,
) -> Json<SystemStatusDto> {
    Json(state.store.counts().await.into())
}

/// Job details by id.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    responses(
        (status = 200, description = "Job details", body = JobDto),
        (status = 404, description = "Job not found"),
    ),
    tag = "jobs"
)]
pub async fn get_job_handler(
    State(state): State<JobsApiAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDto>, StatusCode> {
    match state.store.get(&JobId::from_uuid(id)).await {
        Some(job) => Ok(Json(job.into())),
        None => {
            warn!("job not found: {id}");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// Stream a job's log lines as Server-Sent Events.
///
/// Polls the log resource once per second and closes with a final
/// `[Job <status>]` marker once the job reaches a terminal state.
#[utoipa::path(
    get,
    path = "/api/jobs/{id}/logs",
    responses(
        (status = 200, description = "SSE stream of log lines"),
        (status = 404, description = "Job not found or has no log file"),
    ),
    tag = "jobs"
)]
pub async fn stream_job_logs_handler(
    State(state): State<JobsApiAppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let id = JobId::from_uuid(id);
    let job = state.store.get(&id).await.ok_or(StatusCode::NOT_FOUND)?;
    let log_file = job.log_file.ok_or(StatusCode::NOT_FOUND)?;

    let store = Arc::clone(&state.store);
    let (tx, rx) = tokio::sync::mpsc::channel::<Event>(64);
    tokio::spawn(async move {
        let mut position = 0u64;
        let mut ticker = tokio::time::interval(LOG_POLL_INTERVAL);
        loop {
            ticker.tick().await;

            let (content, new_position) = read_log_from(&log_file, position).await;
            if !content.is_empty() {
                for line in content.lines().filter(|line| !line.trim().is_empty()) {
                    if tx.send(Event::default().data(line)).await.is_err() {
                        // Subscriber went away.
                        return;
                    }
                }
                position = new_position;
            }

            match store.get(&id).await {
                Some(current) if current.is_terminal() => {
                    let marker = format!("[Job {}]", current.status);
                    let _ = tx.send(Event::default().data(marker)).await;
                    return;
                }
                Some(_) => {}
                None => return,
            }
        }
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok::<_, Infallible>(event), rx))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Cancel a running job.
#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    responses(
        (status = 200, description = "Job cancelled", body = CancelJobResponseDto),
        (status = 400, description = "Job is not cancellable in its current status"),
        (status = 404, description = "Job not found"),
    ),
    tag = "jobs"
)]
pub async fn cancel_job_handler(
    State(state): State<JobsApiAppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelJobResponseDto>, StatusCode> {
    let job_id = JobId::from_uuid(id);
    let job = state
        .store
        .get(&job_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    if job.status != JobStatus::Running {
        warn!("cannot cancel job {id} in {} status", job.status);
        return Err(StatusCode::BAD_REQUEST);
    }

    if !state.manager.cancel(&job_id).await {
        error!("failed to cancel job {id}");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(Json(CancelJobResponseDto {
        job_id: id,
        status: JobStatus::Cancelled.as_str().to_string(),
        message: format!("Job {id} cancelled successfully"),
    }))
}

// ===== Router =====

pub fn jobs_api_routes(state: JobsApiAppState) -> Router {
    Router::new()
        .route("/api/jobs/analyze", post(create_analyze_job_handler))
        .route(
            "/api/jobs/analyze-syntopical",
            post(create_syntopical_job_handler),
        )
        .route("/api/jobs", get(list_jobs_handler))
        .route("/api/jobs/status", get(system_status_handler))
        .route("/api/jobs/{id}", get(get_job_handler).delete(cancel_job_handler))
        .route("/api/jobs/{id}/logs", get(stream_job_logs_handler))
        .with_state(state)
}
