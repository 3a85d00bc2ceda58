//! Server configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    pub port: u16,

    /// Storage locations
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub upload_dir: PathBuf,

    /// Orchestrator CLI invoked per job
    pub cli_path: PathBuf,
    /// Working directory for spawned jobs
    pub workdir: PathBuf,

    /// Job timeout in seconds (default 30 minutes)
    pub job_timeout_secs: u64,
    /// How often the staleness sweep runs, in seconds
    pub sweep_interval_secs: u64,
    /// Days to keep finished jobs before the retention sweep removes them
    pub retention_days: i64,

    /// Maximum upload size in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("./logs"),
            upload_dir: PathBuf::from("./uploads"),
            cli_path: PathBuf::from("./folio"),
            workdir: PathBuf::from("."),
            job_timeout_secs: 1800,
            sweep_interval_secs: 60,
            retention_days: 30,
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = ServerConfig::default();

        if let Ok(host) = env::var("FOLIO_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("FOLIO_PORT") {
            config.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid("FOLIO_PORT".to_string()))?;
        }
        if let Ok(dir) = env::var("FOLIO_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("FOLIO_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("FOLIO_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("FOLIO_CLI_PATH") {
            config.cli_path = PathBuf::from(path);
        }
        if let Ok(dir) = env::var("FOLIO_WORKDIR") {
            config.workdir = PathBuf::from(dir);
        }
        if let Ok(timeout) = env::var("FOLIO_JOB_TIMEOUT") {
            config.job_timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::Invalid("FOLIO_JOB_TIMEOUT".to_string()))?;
        }
        if let Ok(interval) = env::var("FOLIO_SWEEP_INTERVAL") {
            config.sweep_interval_secs = interval
                .parse()
                .map_err(|_| ConfigError::Invalid("FOLIO_SWEEP_INTERVAL".to_string()))?;
        }
        if let Ok(days) = env::var("FOLIO_RETENTION_DAYS") {
            config.retention_days = days
                .parse()
                .map_err(|_| ConfigError::Invalid("FOLIO_RETENTION_DAYS".to_string()))?;
        }
        if let Ok(size) = env::var("FOLIO_MAX_UPLOAD_SIZE") {
            config.max_upload_size = size
                .parse()
                .map_err(|_| ConfigError::Invalid("FOLIO_MAX_UPLOAD_SIZE".to_string()))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host cannot be empty".to_string()));
        }
        if self.job_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "job_timeout_secs cannot be 0".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs cannot be 0".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(ConfigError::Invalid(
                "retention_days must be positive".to_string(),
            ));
        }
        if self.max_upload_size == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_size cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}
