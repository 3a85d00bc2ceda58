//! Server Bootstrap - Component Initialization
//!
//! Wires the job store and lifecycle manager from configuration and owns
//! the background maintenance tasks (staleness sweep, retention sweep).

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use folio_manager::{JobManager, ManagerConfig};
use folio_store::{JsonJobStore, StoreError};

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

#[derive(Clone)]
pub struct ServerComponents {
    pub config: ServerConfig,
    pub store: Arc<JsonJobStore>,
    pub manager: Arc<JobManager>,
}

/// Initialize the store and lifecycle manager from the environment.
pub async fn initialize_server() -> Result<ServerComponents> {
    let config = ServerConfig::from_env()?;
    initialize_with_config(config).await
}

pub async fn initialize_with_config(config: ServerConfig) -> Result<ServerComponents> {
    let store = Arc::new(JsonJobStore::open(&config.data_dir).await?);
    info!("job store initialized at {}", config.data_dir.display());

    let manager_config = ManagerConfig {
        cli_path: config.cli_path.clone(),
        workdir: config.workdir.clone(),
        log_dir: config.log_dir.clone(),
        timeout: config.job_timeout(),
    };
    let manager = Arc::new(JobManager::new(Arc::clone(&store), manager_config));
    info!("lifecycle manager initialized");

    Ok(ServerComponents {
        config,
        store,
        manager,
    })
}

pub fn log_config_summary(config: &ServerConfig) {
    info!("configuration summary:");
    info!("  bind: {}:{}", config.host, config.port);
    info!("  data dir: {}", config.data_dir.display());
    info!("  log dir: {}", config.log_dir.display());
    info!("  upload dir: {}", config.upload_dir.display());
    info!("  cli: {}", config.cli_path.display());
    info!("  job timeout: {}s", config.job_timeout_secs);
    info!("  retention: {} days", config.retention_days);
}

/// Spawn the periodic reconciliation tasks.
///
/// The staleness sweep catches running jobs whose supervisor died; the
/// daily retention sweep removes old records and their logs.
pub fn spawn_maintenance_tasks(components: &ServerComponents) {
    let manager = Arc::clone(&components.manager);
    let sweep_interval = std::time::Duration::from_secs(components.config.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        // The immediate first tick would sweep before anything can be stale.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let marked = manager.sweep_stuck().await;
            if marked > 0 {
                warn!("staleness sweep marked {marked} job(s) stuck");
            }
        }
    });

    let store = Arc::clone(&components.store);
    let retention_days = components.config.retention_days;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
            match store.sweep(cutoff).await {
                Ok(0) => {}
                Ok(deleted) => info!("retention sweep deleted {deleted} job(s)"),
                Err(e) => error!("retention sweep failed: {e}"),
            }
        }
    });
}
