//! Folio Server Library
//!
//! HTTP surface for the Folio job orchestration system: job creation and
//! queries, log streaming, EPUB uploads and health reporting layered on
//! the lifecycle manager and the job store.

pub mod api_docs;
pub mod api_router;
pub mod bootstrap;
pub mod config;
pub mod dtos;
pub mod health_api;
pub mod jobs_api;
pub mod upload_api;

pub use crate::api_router::create_api_router;
pub use crate::bootstrap::{
    BootstrapError, ServerComponents, initialize_server, log_config_summary,
    spawn_maintenance_tasks,
};
pub use crate::config::{ConfigError, ServerConfig};
