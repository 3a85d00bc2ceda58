//! Health check endpoint

use axum::{Router, response::Json, routing::get};
use chrono::Utc;

use crate::dtos::HealthDto;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthDto)),
    tag = "health"
)]
pub async fn health_check_handler() -> Json<HealthDto> {
    Json(HealthDto {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

pub fn health_api_routes() -> Router {
    Router::new().route("/health", get(health_check_handler))
}
