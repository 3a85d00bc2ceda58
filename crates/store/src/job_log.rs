//! Per-job append-only log resources
//!
//! One log file per job, written by the supervising task and read
//! incrementally by the log-streaming endpoint. Readers never fail on an
//! absent file: before the supervisor opens the log there is simply
//! nothing to stream yet.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use folio_core::JobId;

/// Appender for one job's log file.
pub struct JobLogger {
    job_id: JobId,
    path: PathBuf,
}

impl JobLogger {
    /// Create the log file for a job under `log_dir`. The timestamp suffix
    /// keeps logs from a re-created id from colliding.
    pub async fn create(log_dir: impl AsRef<Path>, job_id: JobId) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        tokio::fs::create_dir_all(log_dir).await?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = log_dir.join(format!("{job_id}_{stamp}.log"));
        File::create(&path).await?;
        Ok(Self {
            job_id,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, prefixed with a timestamp and the job id.
    pub async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let record = format!(
            "{} - JOB:{} - {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.job_id,
            line
        );
        file.write_all(record.as_bytes()).await?;
        Ok(())
    }
}

/// Read newly appended content from `position` onwards.
///
/// Returns the new content and the position to resume from. An absent file
/// yields empty content at position 0; a read failure leaves the caller's
/// position unchanged so the next poll retries.
pub async fn read_log_from(path: &Path, position: u64) -> (String, u64) {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(_) => return (String::new(), 0),
    };
    if file.seek(SeekFrom::Start(position)).await.is_err() {
        return (String::new(), position);
    }
    let mut content = String::new();
    match file.read_to_string(&mut content).await {
        Ok(read) => (content, position + read as u64),
        Err(_) => (String::new(), position),
    }
}

/// Last `lines` lines of a log file; empty when the file is absent.
pub async fn tail_log(path: &Path, lines: usize) -> Vec<String> {
    let Ok(content) = tokio::fs::read_to_string(path).await else {
        return Vec::new();
    };
    let all: Vec<&str> = content.lines().collect();
    let skip = all.len().saturating_sub(lines);
    all[skip..].iter().map(|line| line.to_string()).collect()
}
