//! FILENAME: core/engine/src/job.rs
//! PURPOSE: Asynchronous job collaborator used to run producers off the caller's thread.
//! CONTEXT: The export loop never joins the producer. It learns about completion
//! only by polling `get_status`, so a status lookup failure means the job is lost.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// Unique identifier for a started job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Running,
    Complete,
    Error,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "RUNNING"),
            JobState::Complete => write!(f, "COMPLETE"),
            JobState::Error => write!(f, "ERROR"),
        }
    }
}

/// Snapshot returned by a status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Rows produced, once complete.
    pub result: Option<u64>,
    /// Failure message, once in error.
    pub message: Option<String>,
}

impl JobStatus {
    pub fn running() -> Self {
        JobStatus {
            state: JobState::Running,
            result: None,
            message: None,
        }
    }

    pub fn complete(rows: u64) -> Self {
        JobStatus {
            state: JobState::Complete,
            result: Some(rows),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        JobStatus {
            state: JobState::Error,
            result: None,
            message: Some(message.into()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

/// Work handed to a job manager. Returns the produced row count or a failure message.
pub type JobTask = Box<dyn FnOnce() -> Result<u64, String> + Send + 'static>;

pub trait JobManager: Send + Sync {
    fn start_job(&self, name: &str, task: JobTask) -> JobId;

    fn get_status(&self, id: JobId) -> Result<JobStatus, JobError>;

    /// Discards the status of a finished job once nobody will poll it again.
    /// Returns whether anything was removed. Managers that keep no history
    /// need not override this.
    fn forget(&self, _id: JobId) -> bool {
        false
    }
}

/// Runs every job on its own named OS thread.
pub struct ThreadJobManager {
    next_id: AtomicU64,
    jobs: Arc<Mutex<HashMap<JobId, JobStatus>>>,
}

impl ThreadJobManager {
    pub fn new() -> Self {
        ThreadJobManager {
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for ThreadJobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_jobs(
    jobs: &Mutex<HashMap<JobId, JobStatus>>,
) -> MutexGuard<'_, HashMap<JobId, JobStatus>> {
    jobs.lock().unwrap_or_else(|e| e.into_inner())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}

impl JobManager for ThreadJobManager {
    fn start_job(&self, name: &str, task: JobTask) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock_jobs(&self.jobs).insert(id, JobStatus::running());

        let jobs = self.jobs.clone();
        let job_name = name.to_string();
        let spawned = thread::Builder::new()
            .name(format!("job-{}-{}", id, name))
            .spawn(move || {
                let status = match panic::catch_unwind(AssertUnwindSafe(task)) {
                    Ok(Ok(rows)) => {
                        debug!("job {} ({}) complete, {} rows", id, job_name, rows);
                        JobStatus::complete(rows)
                    }
                    Ok(Err(message)) => {
                        error!("job {} ({}) failed: {}", id, job_name, message);
                        JobStatus::failed(message)
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("job {} ({}) panicked: {}", id, job_name, message);
                        JobStatus::failed(message)
                    }
                };
                lock_jobs(&jobs).insert(id, status);
            });

        if let Err(e) = spawned {
            error!("could not spawn thread for job {} ({}): {}", id, name, e);
            lock_jobs(&self.jobs).insert(id, JobStatus::failed(format!("spawn failed: {}", e)));
        }

        id
    }

    fn get_status(&self, id: JobId) -> Result<JobStatus, JobError> {
        lock_jobs(&self.jobs)
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// Running jobs are kept.
    fn forget(&self, id: JobId) -> bool {
        let mut jobs = lock_jobs(&self.jobs);
        match jobs.get(&id) {
            Some(status) if !status.is_running() => jobs.remove(&id).is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_until_done(manager: &ThreadJobManager, id: JobId) -> JobStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = manager.get_status(id).unwrap();
            if !status.is_running() || Instant::now() > deadline {
                return status;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_job_reports_running_then_complete() {
        let manager = ThreadJobManager::new();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let id = manager.start_job(
            "count",
            Box::new(move || -> Result<u64, String> {
                release_rx.recv().map_err(|e| e.to_string())?;
                Ok(42)
            }),
        );

        assert_eq!(manager.get_status(id).unwrap().state, JobState::Running);
        release_tx.send(()).unwrap();

        let status = wait_until_done(&manager, id);
        assert_eq!(status, JobStatus::complete(42));
    }

    #[test]
    fn test_failed_and_panicking_jobs_report_error() {
        let manager = ThreadJobManager::new();
        let failed = manager.start_job("fail", Box::new(|| -> Result<u64, String> { Err("disk on fire".to_string()) }));
        let panicked = manager.start_job("panic", Box::new(|| -> Result<u64, String> { panic!("boom") }));

        let status = wait_until_done(&manager, failed);
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.message.as_deref(), Some("disk on fire"));

        let status = wait_until_done(&manager, panicked);
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_unknown_and_forgotten_jobs() {
        let manager = ThreadJobManager::new();
        assert_eq!(manager.get_status(JobId(999)), Err(JobError::NotFound(JobId(999))));

        let id = manager.start_job("quick", Box::new(|| -> Result<u64, String> { Ok(0) }));
        wait_until_done(&manager, id);
        assert!(manager.forget(id));
        assert!(!manager.forget(id));
        assert!(manager.get_status(id).is_err());
    }
}
