//! API Documentation using OpenAPI 3.0 with utoipa

use utoipa::OpenApi;

use crate::dtos::{
    CancelJobResponseDto, CreateJobRequest, HealthDto, JobDto, JobListDto, SystemStatusDto,
    UploadResponseDto,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::jobs_api::create_analyze_job_handler,
        crate::jobs_api::create_syntopical_job_handler,
        crate::jobs_api::list_jobs_handler,
        crate::jobs_api::system_status_handler,
        crate::jobs_api::get_job_handler,
        crate::jobs_api::stream_job_logs_handler,
        crate::jobs_api::cancel_job_handler,
        crate::upload_api::upload_file_handler,
        crate::health_api::health_check_handler,
    ),
    components(schemas(
        JobDto,
        JobListDto,
        CreateJobRequest,
        CancelJobResponseDto,
        SystemStatusDto,
        UploadResponseDto,
        HealthDto,
    )),
    tags(
        (name = "jobs", description = "Job lifecycle and queries"),
        (name = "upload", description = "EPUB uploads"),
        (name = "health", description = "Service health"),
    ),
    info(
        title = "Folio Admin API",
        description = "Admin API for managing book-analysis jobs and uploads"
    )
)]
pub struct ApiDoc;
