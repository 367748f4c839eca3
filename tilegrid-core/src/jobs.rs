//! Seams towards the external download and removal subsystems.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::region::RegionCoordinate;

/// Opaque identifier of an external download job.
///
/// # Examples
/// ```
/// use tilegrid_core::JobId;
///
/// let id = JobId::new(42);
/// assert_eq!(id.get(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobId(i64);

impl JobId {
    /// Wrap a raw job identifier.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw identifier, as persisted and as understood by the job
    /// manager.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a download job as reported by the job manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Accepted but not yet running.
    Pending,
    /// Transfer in progress.
    Running,
    /// Temporarily halted by the job manager; expected to resume.
    Paused,
    /// Finished; the destination file holds the complete package.
    Succeeded,
    /// Finished unsuccessfully.
    Failed,
    /// The job manager has no record of the identifier.
    Unknown,
}

impl JobStatus {
    /// Whether the job is still worth waiting for. Startup reconciliation
    /// keeps a persisted job id only while its status is active; anything
    /// else is treated as stale bookkeeping and cleared.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Paused)
    }
}

/// Everything the job manager needs to start one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    /// Fully qualified URL of the package to fetch.
    pub url: String,
    /// File the package must be written to.
    pub destination: PathBuf,
    /// Short human-readable label for the job.
    pub title: String,
    /// Longer description, typically the application name.
    pub description: String,
}

/// Errors surfaced by [`DownloadJobManager::submit`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JobManagerError {
    /// The job could not be handed to the download subsystem.
    #[error("failed to submit download job for {url}: {message}")]
    Submit {
        /// URL of the rejected request.
        url: String,
        /// Short description supplied by the subsystem.
        message: String,
    },
}

/// Thin interface to the external asynchronous download subsystem.
///
/// Implementations own whatever concurrency the transfers need; all three
/// operations are cheap synchronous calls from the engine's point of view.
/// Status queries for unknown identifiers must report
/// [`JobStatus::Unknown`] rather than fail.
pub trait DownloadJobManager {
    /// Enqueue a download and return its identifier.
    fn submit(&self, request: JobRequest) -> Result<JobId, JobManagerError>;

    /// Current status of a previously submitted job.
    fn status(&self, id: JobId) -> JobStatus;

    /// Abort a job and discard its bookkeeping. Cancelling an unknown or
    /// finished job is a no-op.
    fn cancel(&self, id: JobId);
}

/// Fire-and-forget dispatch of region removal work to an external worker.
///
/// The engine clears the pending selection as soon as the request is handed
/// over; completion is observed only when the worker calls back into the
/// removal operation.
pub trait RemovalDispatcher {
    /// Request that `coordinate` be removed from the local store.
    fn dispatch(&self, coordinate: RegionCoordinate);
}
