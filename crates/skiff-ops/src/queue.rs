//! Job queue: one worker per job, cancellation, snapshot listing.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use skiff_core::{
    EngineConfig, FileError, Job, JobId, JobRequest, JobState, OpsError, ProgressSnapshot,
};
use tokio::sync::mpsc;

use crate::EVENT_CHANNEL_SIZE;
use crate::clipboard::Clipboard;
use crate::executor::CopyMoveExecutor;
use crate::progress::ProgressReporter;

/// Lifecycle notifications pushed to the interface layer.
///
/// Progress itself is pulled via [`JobQueue::list`] so the engine never
/// couples to the interface's redraw cadence; only lifecycle edges are
/// pushed.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A job was accepted and its worker spawned.
    JobCreated(JobId),
    /// A job reached a terminal state.
    JobTerminal {
        id: JobId,
        state: JobState,
        errors: Vec<FileError>,
    },
}

/// Accepts operation requests and runs each job on an independent worker.
///
/// Construct one queue explicitly and thread a handle through the command
/// handlers; there is no process-wide instance.
#[derive(Debug)]
pub struct JobQueue {
    config: EngineConfig,
    reporter: Arc<ProgressReporter>,
    events: mpsc::Sender<EngineEvent>,
    next_id: AtomicU64,
}

impl JobQueue {
    /// Create a queue plus the receiver for its lifecycle events.
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let queue = Self {
            config,
            reporter: Arc::new(ProgressReporter::default()),
            events,
            next_id: AtomicU64::new(1),
        };
        (queue, receiver)
    }

    /// Shared read access for diagnostics and custom polling.
    pub fn reporter(&self) -> Arc<ProgressReporter> {
        Arc::clone(&self.reporter)
    }

    /// Submit a request. Returns immediately with the new job's id; the
    /// work runs on a dedicated background task.
    pub fn submit(&self, request: JobRequest) -> JobId {
        let id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let use_trash = match &request {
            JobRequest::Delete { use_trash, .. } => *use_trash,
            _ => false,
        };

        let job = Job::new(id, &request);
        let kind = job.kind;
        let entries = job.entries.clone();
        let tracker = self.reporter.register(job);
        self.send_event(EngineEvent::JobCreated(id));
        tracing::debug!(job = %id, %kind, entries = entries.len(), "job submitted");

        let config = self.config.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let executor = CopyMoveExecutor::new(tracker.clone(), config, use_trash);
            let state = executor.run(kind, &entries).await;
            let errors = tracker.errors();
            tracing::info!(job = %id, %state, errors = errors.len(), "job finished");
            if events
                .try_send(EngineEvent::JobTerminal { id, state, errors })
                .is_err()
            {
                tracing::warn!(job = %id, "event channel full, terminal notification dropped");
            }
        });

        id
    }

    /// Paste the clipboard into `dest_dir`.
    ///
    /// Fails synchronously with [`OpsError::EmptyClipboard`] before any job
    /// is created; the clipboard's copy/cut semantics are applied by
    /// [`Clipboard::paste`].
    pub fn paste(
        &self,
        clipboard: &mut Clipboard,
        dest_dir: impl Into<PathBuf>,
    ) -> Result<JobId, OpsError> {
        let request = clipboard.paste(dest_dir)?;
        Ok(self.submit(request))
    }

    /// Delete `targets`, honoring the configured trash preference.
    pub fn delete(&self, targets: Vec<PathBuf>) -> JobId {
        self.submit(JobRequest::delete(targets, self.config.use_trash))
    }

    /// Request cooperative cancellation of a job.
    ///
    /// Returns false for unknown or already-terminal jobs. Cancelling one
    /// job has no effect on its siblings.
    pub fn cancel(&self, id: JobId) -> bool {
        self.reporter.cancel(id)
    }

    /// Point-in-time snapshots of all tracked jobs, oldest first.
    ///
    /// Terminal jobs past the retention window are pruned first.
    pub fn list(&self) -> Vec<ProgressSnapshot> {
        self.reporter.prune(self.config.retention);
        self.reporter.snapshots()
    }

    /// Snapshot of a single job.
    pub fn snapshot(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.reporter.snapshot(id)
    }

    /// Drop a terminal job from the registry once the interface has
    /// surfaced its outcome. Returns false if unknown or still active.
    pub fn acknowledge(&self, id: JobId) -> bool {
        self.reporter.remove_terminal(id)
    }

    fn send_event(&self, event: EngineEvent) {
        if self.events.try_send(event).is_err() {
            tracing::warn!("event channel full, notification dropped");
        }
    }
}
