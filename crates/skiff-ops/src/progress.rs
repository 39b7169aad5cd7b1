//! Shared job state: one writer per job, many polling readers.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use skiff_core::{FileError, Job, JobId, JobState, OpsError, ProgressSnapshot};
use tokio_util::sync::CancellationToken;

/// Shared cell for one job: the record plus its cancellation token.
///
/// The record has exactly one writer (the owning worker, through a
/// [`JobTracker`]); readers only ever take cloned snapshots, never a live
/// reference, so a reader can hold its copy across frames.
#[derive(Debug)]
struct JobCell {
    job: RwLock<Job>,
    cancel: CancellationToken,
}

impl JobCell {
    fn read<R>(&self, f: impl FnOnce(&Job) -> R) -> R {
        let job = self.job.read().unwrap_or_else(PoisonError::into_inner);
        f(&job)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Job) -> R) -> R {
        let mut job = self.job.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut job)
    }
}

/// Writer handle held by the worker that owns a job.
#[derive(Debug, Clone)]
pub(crate) struct JobTracker {
    cell: Arc<JobCell>,
}

impl JobTracker {
    /// Clone of the job's cancellation token.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cell.cancel.clone()
    }

    /// Mark the job running.
    pub(crate) fn start(&self) {
        self.cell.write(|job| {
            job.state = JobState::Running;
            job.started_at = Some(Instant::now());
        });
    }

    /// Record the totals computed by the pre-scan.
    pub(crate) fn set_totals(&self, bytes: u64, items: u64) {
        self.cell.write(|job| {
            job.total_bytes = bytes;
            job.total_items = items;
        });
    }

    /// Update the file currently being processed.
    pub(crate) fn begin_file(&self, path: &Path) {
        self.cell.write(|job| job.current_file = Some(path.to_path_buf()));
    }

    /// Add transferred bytes.
    pub(crate) fn add_bytes(&self, bytes: u64) {
        self.cell.write(|job| job.processed_bytes += bytes);
    }

    /// Add completed progress items.
    pub(crate) fn add_items(&self, items: u64) {
        self.cell.write(|job| job.processed_items += items);
    }

    /// Record a per-file error without aborting the job.
    pub(crate) fn record_error(&self, path: &Path, error: &OpsError) {
        tracing::warn!(path = %path.display(), %error, "file operation failed");
        self.cell
            .write(|job| job.errors.push(FileError::new(path, error.to_string())));
    }

    /// Record a fully-succeeded top-level entry for later reversal.
    pub(crate) fn record_completed(&self, source: &Path, dest: &Path) {
        self.cell.write(|job| {
            job.completed
                .push((source.to_path_buf(), dest.to_path_buf()));
        });
    }

    /// Number of errors recorded so far.
    pub(crate) fn error_count(&self) -> usize {
        self.cell.read(|job| job.errors.len())
    }

    /// Cloned error list.
    pub(crate) fn errors(&self) -> Vec<FileError> {
        self.cell.read(|job| job.errors.clone())
    }

    /// Transition the job to its terminal state and freeze it.
    pub(crate) fn finish(&self, state: JobState) {
        self.cell.write(|job| {
            job.state = state;
            job.finished_at = Some(Instant::now());
            job.current_file = None;
        });
    }
}

/// Thread-safe registry of job state, polled by the interface layer.
///
/// Lookup access is non-owning: the queue decides when records are inserted
/// and removed, readers only take point-in-time copies.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    jobs: DashMap<JobId, Arc<JobCell>>,
}

impl ProgressReporter {
    /// Insert a new job and hand its writer handle to the worker.
    pub(crate) fn register(&self, job: Job) -> JobTracker {
        let id = job.id;
        let cell = Arc::new(JobCell {
            job: RwLock::new(job),
            cancel: CancellationToken::new(),
        });
        self.jobs.insert(id, Arc::clone(&cell));
        JobTracker { cell }
    }

    /// Point-in-time snapshot of one job.
    pub fn snapshot(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.jobs
            .get(&id)
            .map(|cell| cell.read(ProgressSnapshot::of))
    }

    /// Snapshots of all tracked jobs, oldest first.
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        let mut snapshots: Vec<ProgressSnapshot> = self
            .jobs
            .iter()
            .map(|entry| entry.value().read(ProgressSnapshot::of))
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        snapshots
    }

    /// Cloned job record, including the completed-entry pairs.
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|cell| cell.read(Job::clone))
    }

    /// Set the cooperative cancellation flag for a job.
    ///
    /// Returns false for unknown or already-terminal jobs.
    pub(crate) fn cancel(&self, id: JobId) -> bool {
        let Some(cell) = self.jobs.get(&id) else {
            return false;
        };
        if cell.read(|job| job.state.is_terminal()) {
            return false;
        }
        cell.cancel.cancel();
        true
    }

    /// Remove a terminal job. Returns false if unknown or still active.
    pub(crate) fn remove_terminal(&self, id: JobId) -> bool {
        let removable = self
            .jobs
            .get(&id)
            .is_some_and(|cell| cell.read(|job| job.state.is_terminal()));
        if removable {
            self.jobs.remove(&id);
        }
        removable
    }

    /// Drop terminal jobs that finished more than `retention` ago.
    pub(crate) fn prune(&self, retention: Duration) {
        self.jobs.retain(|_, cell| {
            cell.read(|job| match (job.state.is_terminal(), job.finished_at) {
                (true, Some(finished)) => finished.elapsed() <= retention,
                _ => true,
            })
        });
    }
}
