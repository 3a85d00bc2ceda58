//! File Upload API Module
//!
//! Accepts EPUB uploads into the configured upload directory so they can
//! be referenced by analysis jobs.

use std::path::PathBuf;

use axum::{
    Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
    routing::post,
};
use tracing::{error, info, warn};

use crate::dtos::UploadResponseDto;

#[derive(Clone)]
pub struct UploadApiAppState {
    pub upload_dir: PathBuf,
    pub max_upload_size: usize,
}

/// Pick a destination path, suffixing the stem until it is collision-free.
async fn destination_for(upload_dir: &PathBuf, filename: &str) -> PathBuf {
    let safe_name = filename.replace(' ', "_");
    let original = upload_dir.join(&safe_name);
    let mut candidate = original.clone();
    let mut counter = 1;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        let stem = original
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = original
            .extension()
            .map(|s| format!(".{}", s.to_string_lossy()))
            .unwrap_or_default();
        candidate = upload_dir.join(format!("{stem}_{counter}{extension}"));
        counter += 1;
    }
    candidate
}

/// Upload an EPUB file for processing.
#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "File stored", body = UploadResponseDto),
        (status = 400, description = "Missing file field or unsupported extension"),
        (status = 413, description = "File exceeds the configured size limit"),
    ),
    tag = "upload"
)]
pub async fn upload_file_handler(
    State(state): State<UploadApiAppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponseDto>, StatusCode> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            warn!("malformed multipart upload: {e}");
            StatusCode::BAD_REQUEST
        })?
        .ok_or(StatusCode::BAD_REQUEST)?;

    let filename = field
        .file_name()
        .map(ToString::to_string)
        .ok_or(StatusCode::BAD_REQUEST)?;
    if !filename.to_lowercase().ends_with(".epub") {
        warn!("rejected upload of non-EPUB file: {filename}");
        return Err(StatusCode::BAD_REQUEST);
    }

    let data = field.bytes().await.map_err(|e| {
        warn!("failed to read upload body: {e}");
        StatusCode::BAD_REQUEST
    })?;
    if data.len() > state.max_upload_size {
        warn!(
            "rejected upload of {} bytes (limit {})",
            data.len(),
            state.max_upload_size
        );
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    if let Err(e) = tokio::fs::create_dir_all(&state.upload_dir).await {
        error!("failed to create upload directory: {e}");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let destination = destination_for(&state.upload_dir, &filename).await;
    if let Err(e) = tokio::fs::write(&destination, &data).await {
        error!("failed to store upload at {}: {e}", destination.display());
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    info!("stored upload {} ({} bytes)", destination.display(), data.len());
    Ok(Json(UploadResponseDto {
        filename: destination
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(filename),
        file_path: destination.display().to_string(),
        size: data.len(),
        message: "File uploaded successfully".to_string(),
    }))
}

pub fn upload_api_routes(state: UploadApiAppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload_file_handler))
        .with_state(state)
}
