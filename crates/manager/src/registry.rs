//! Supervision registry
//!
//! Live handles for the OS process and the supervising task of each
//! running job. Entries are inserted by `start`, removed on terminal
//! transition and by `cancel`; removal is idempotent.

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use folio_core::JobId;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared handle to a supervised child process.
///
/// The supervising task waits on it while `cancel` may kill it; the inner
/// option is emptied once the process has been reaped so both sides see
/// the same terminal fact.
#[derive(Clone)]
pub struct ProcessHandle {
    child: Arc<Mutex<Option<Child>>>,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        Self {
            child: Arc::new(Mutex::new(Some(child))),
        }
    }

    pub async fn pid(&self) -> Option<u32> {
        let guard = self.child.lock().await;
        guard.as_ref().and_then(|child| child.id())
    }

    /// Forcefully terminate the process and await its exit.
    pub async fn kill(&self) -> std::io::Result<()> {
        let mut guard = self.child.lock().await;
        if let Some(child) = guard.as_mut() {
            warn!("killing process (pid {:?})", child.id());
            child.start_kill()?;
            let _ = child.wait().await;
            *guard = None;
            info!("process killed");
        }
        Ok(())
    }

    /// Wait for the process to exit.
    ///
    /// Polls so the handle is never locked across the wait: a concurrent
    /// `kill` must be able to take it. Returns `None` when the process was
    /// reaped elsewhere (cancellation).
    pub async fn wait(&self) -> std::io::Result<Option<ExitStatus>> {
        loop {
            {
                let mut guard = self.child.lock().await;
                match guard.as_mut() {
                    Some(child) => {
                        if let Some(status) = child.try_wait()? {
                            *guard = None;
                            return Ok(Some(status));
                        }
                    }
                    None => return Ok(None),
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    processes: HashMap<JobId, ProcessHandle>,
    tasks: HashMap<JobId, JoinHandle<()>>,
}

/// Registry of live supervision state, keyed by job id.
#[derive(Default)]
pub struct SupervisionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SupervisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_process(&self, id: JobId, handle: ProcessHandle) {
        let mut inner = self.inner.lock().await;
        inner.processes.insert(id, handle);
    }

    pub async fn register_task(&self, id: JobId, task: JoinHandle<()>) {
        let mut inner = self.inner.lock().await;
        inner.tasks.insert(id, task);
    }

    pub async fn process(&self, id: &JobId) -> Option<ProcessHandle> {
        let inner = self.inner.lock().await;
        inner.processes.get(id).cloned()
    }

    pub async fn take_task(&self, id: &JobId) -> Option<JoinHandle<()>> {
        let mut inner = self.inner.lock().await;
        inner.tasks.remove(id)
    }

    /// Drop both handles for a job. Safe to call more than once.
    pub async fn remove(&self, id: &JobId) {
        let mut inner = self.inner.lock().await;
        inner.processes.remove(id);
        inner.tasks.remove(id);
    }

    pub async fn is_supervising(&self, id: &JobId) -> bool {
        let inner = self.inner.lock().await;
        inner.processes.contains_key(id) || inner.tasks.contains_key(id)
    }
}
