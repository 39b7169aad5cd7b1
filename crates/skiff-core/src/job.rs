//! Job records: the tracked unit of scheduled filesystem mutation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::FileError;

/// Unique identifier for a job.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new job id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of filesystem mutation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    Copy,
    Move,
    Delete,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copy => write!(f, "Copy"),
            Self::Move => write!(f, "Move"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Accepted but not yet picked up by its worker.
    Queued,
    /// The owning worker is processing entries.
    Running,
    /// Every entry succeeded.
    Completed,
    /// At least one entry succeeded and at least one failed.
    PartiallyFailed,
    /// Every entry failed.
    Failed,
    /// Cancellation was observed before the job finished.
    Cancelled,
}

impl JobState {
    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartiallyFailed | Self::Failed | Self::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "Queued"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::PartiallyFailed => write!(f, "Partially failed"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// An operation request submitted to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobRequest {
    /// Copy sources into a destination directory.
    Copy {
        sources: Vec<PathBuf>,
        dest_dir: PathBuf,
    },
    /// Move sources into a destination directory.
    Move {
        sources: Vec<PathBuf>,
        dest_dir: PathBuf,
    },
    /// Delete targets.
    Delete {
        targets: Vec<PathBuf>,
        use_trash: bool,
    },
}

impl JobRequest {
    /// Create a copy request.
    pub fn copy(sources: Vec<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self::Copy {
            sources,
            dest_dir: dest_dir.into(),
        }
    }

    /// Create a move request.
    pub fn move_to(sources: Vec<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self::Move {
            sources,
            dest_dir: dest_dir.into(),
        }
    }

    /// Create a delete request.
    pub fn delete(targets: Vec<PathBuf>, use_trash: bool) -> Self {
        Self::Delete { targets, use_trash }
    }

    /// The job kind this request maps to.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Copy { .. } => JobKind::Copy,
            Self::Move { .. } => JobKind::Move,
            Self::Delete { .. } => JobKind::Delete,
        }
    }

    /// Expand into the ordered (source, destination-directory) entry list.
    pub fn entries(&self) -> Vec<JobEntry> {
        match self {
            Self::Copy { sources, dest_dir } | Self::Move { sources, dest_dir } => sources
                .iter()
                .map(|source| JobEntry {
                    source: source.clone(),
                    dest_dir: Some(dest_dir.clone()),
                })
                .collect(),
            Self::Delete { targets, .. } => targets
                .iter()
                .map(|target| JobEntry {
                    source: target.clone(),
                    dest_dir: None,
                })
                .collect(),
        }
    }
}

/// One (source, destination-directory) pair of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    /// Source path the entry operates on.
    pub source: PathBuf,
    /// Destination directory; `None` for delete entries.
    pub dest_dir: Option<PathBuf>,
}

/// One scheduled filesystem mutation, tracked end-to-end.
///
/// A job is mutated only by its owning worker while running and becomes
/// immutable once terminal. Entries are captured by value at creation, so
/// later clipboard changes never affect a job in flight.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub entries: Vec<JobEntry>,
    pub state: JobState,
    /// Total bytes to transfer (0 for delete jobs).
    pub total_bytes: u64,
    pub processed_bytes: u64,
    /// Total progress items: leaf files for copy/move, entries for delete.
    pub total_items: u64,
    pub processed_items: u64,
    /// File the worker is currently processing.
    pub current_file: Option<PathBuf>,
    pub errors: Vec<FileError>,
    /// (source, final destination) for fully-succeeded top-level entries.
    pub completed: Vec<(PathBuf, PathBuf)>,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
}

impl Job {
    /// Create a queued job from a request.
    pub fn new(id: JobId, request: &JobRequest) -> Self {
        Self {
            id,
            kind: request.kind(),
            entries: request.entries(),
            state: JobState::Queued,
            total_bytes: 0,
            processed_bytes: 0,
            total_items: 0,
            processed_items: 0,
            current_file: None,
            errors: Vec::new(),
            completed: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Time spent running, frozen once terminal.
    pub fn elapsed(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => finished.duration_since(started),
            (Some(started), None) => started.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
