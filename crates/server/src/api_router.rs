//! Centralized API Router
//!
//! Single point of entry for all API routes, used by both the server
//! binary and the integration tests.

use axum::{Router, extract::DefaultBodyLimit, response::Json, routing::get};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::ServerComponents;
use crate::health_api::health_api_routes;
use crate::jobs_api::{JobsApiAppState, jobs_api_routes};
use crate::upload_api::{UploadApiAppState, upload_api_routes};

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Folio Admin API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}

pub fn create_api_router(components: ServerComponents) -> Router {
    let jobs_state = JobsApiAppState::new(components.manager.clone());
    let upload_state = UploadApiAppState {
        upload_dir: components.config.upload_dir.clone(),
        max_upload_size: components.config.max_upload_size,
    };

    Router::new()
        .route("/", get(root_handler))
        .merge(health_api_routes())
        .merge(jobs_api_routes(jobs_state))
        .merge(upload_api_routes(upload_state))
        .layer(DefaultBodyLimit::max(components.config.max_upload_size))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
