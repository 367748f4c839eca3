//! Reference implementation of the download job manager.
//!
//! [`PackageJobManager`] satisfies the engine's
//! [`DownloadJobManager`] seam by spawning one task per submitted job on a
//! caller-supplied tokio runtime and tracking each job's status in a
//! registry. Cancelling aborts the task and forgets the job, so later
//! status queries report [`JobStatus::Unknown`] and reconciliation treats
//! the persisted id as stale.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tilegrid_core::{DownloadJobManager, JobId, JobManagerError, JobRequest, JobStatus};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

mod transport;

pub use transport::{HttpTransport, PackageTransport, TransportError, DEFAULT_USER_AGENT};

/// Job manager that downloads packages through a [`PackageTransport`].
pub struct PackageJobManager {
    transport: Arc<dyn PackageTransport>,
    runtime: Handle,
    next_id: AtomicI64,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
}

struct JobEntry {
    status: Arc<Mutex<JobStatus>>,
    task: JoinHandle<()>,
}

impl PackageJobManager {
    /// Construct a manager downloading over HTTP.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self::with_transport(runtime, Arc::new(HttpTransport::new()))
    }

    /// Construct a manager using the supplied transport.
    #[must_use]
    pub fn with_transport(runtime: Handle, transport: Arc<dyn PackageTransport>) -> Self {
        Self {
            transport,
            runtime,
            next_id: AtomicI64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for PackageJobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PackageJobManager")
            .field("jobs", &jobs.len())
            .finish_non_exhaustive()
    }
}

impl DownloadJobManager for PackageJobManager {
    fn submit(&self, request: JobRequest) -> Result<JobId, JobManagerError> {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let status = Arc::new(Mutex::new(JobStatus::Pending));
        let transport = Arc::clone(&self.transport);
        let task_status = Arc::clone(&status);
        let JobRequest {
            url,
            destination,
            title,
            ..
        } = request;
        let task = self.runtime.spawn(async move {
            set_status(&task_status, JobStatus::Running);
            match transport.fetch(&url, &destination).await {
                Ok(bytes) => {
                    log::debug!("download '{title}' finished ({bytes} bytes)");
                    set_status(&task_status, JobStatus::Succeeded);
                }
                Err(error) => {
                    log::warn!("download '{title}' failed: {error}");
                    set_status(&task_status, JobStatus::Failed);
                }
            }
        });
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, JobEntry { status, task });
        Ok(id)
    }

    fn status(&self, id: JobId) -> JobStatus {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).map_or(JobStatus::Unknown, |entry| {
            *entry.status.lock().unwrap_or_else(PoisonError::into_inner)
        })
    }

    fn cancel(&self, id: JobId) {
        let entry = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(entry) = entry {
            entry.task.abort();
            log::debug!("cancelled download job {id}");
        }
    }
}

fn set_status(slot: &Mutex<JobStatus>, status: JobStatus) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = status;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTransport;
    use rstest::rstest;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(destination: PathBuf) -> JobRequest {
        JobRequest {
            url: "https://tiles.example.org/maps/3/3-5.tiles".to_owned(),
            destination,
            title: "Map 3-5".to_owned(),
            description: "tilegrid".to_owned(),
        }
    }

    fn wait_for_terminal(manager: &PackageJobManager, id: JobId) -> JobStatus {
        for _ in 0..250 {
            let status = manager.status(id);
            if !status.is_active() {
                return status;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        manager.status(id)
    }

    #[rstest]
    fn unknown_jobs_report_unknown() {
        let runtime = tokio::runtime::Runtime::new().expect("create runtime");
        let manager = PackageJobManager::with_transport(
            runtime.handle().clone(),
            Arc::new(StubTransport::succeeding(b"tiles".to_vec())),
        );
        assert_eq!(manager.status(JobId::new(12345)), JobStatus::Unknown);
        manager.cancel(JobId::new(12345));
    }

    #[rstest]
    fn successful_job_writes_the_destination() {
        let runtime = tokio::runtime::Runtime::new().expect("create runtime");
        let temp = TempDir::new().expect("create temp dir");
        let destination = temp.path().join("3-5.tiles");
        let manager = PackageJobManager::with_transport(
            runtime.handle().clone(),
            Arc::new(StubTransport::succeeding(b"tiles".to_vec())),
        );

        let id = manager
            .submit(request(destination.clone()))
            .expect("submit job");

        assert_eq!(wait_for_terminal(&manager, id), JobStatus::Succeeded);
        assert_eq!(
            std::fs::read(&destination).expect("read destination"),
            b"tiles"
        );
    }

    #[rstest]
    fn failing_transport_marks_the_job_failed() {
        let runtime = tokio::runtime::Runtime::new().expect("create runtime");
        let temp = TempDir::new().expect("create temp dir");
        let manager = PackageJobManager::with_transport(
            runtime.handle().clone(),
            Arc::new(StubTransport::failing()),
        );

        let id = manager
            .submit(request(temp.path().join("3-5.tiles")))
            .expect("submit job");

        assert_eq!(wait_for_terminal(&manager, id), JobStatus::Failed);
    }

    #[rstest]
    fn cancelled_jobs_are_forgotten() {
        let runtime = tokio::runtime::Runtime::new().expect("create runtime");
        let temp = TempDir::new().expect("create temp dir");
        let manager = PackageJobManager::with_transport(
            runtime.handle().clone(),
            Arc::new(StubTransport::succeeding(b"tiles".to_vec())),
        );
        let id = manager
            .submit(request(temp.path().join("3-5.tiles")))
            .expect("submit job");

        manager.cancel(id);

        assert_eq!(manager.status(id), JobStatus::Unknown);
    }
}
