//! Read-only progress projections for interface polling.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FileError, Job, JobId, JobKind, JobState};

/// A point-in-time, read-only view of a job.
///
/// Produced on demand from the job record; never a live reference, so the
/// interface layer can hold it across frames without synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub total_bytes: u64,
    pub processed_bytes: u64,
    pub total_items: u64,
    pub processed_items: u64,
    pub current_file: Option<PathBuf>,
    pub errors: Vec<FileError>,
    /// Time spent running so far (frozen once terminal).
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Project a snapshot from a job record.
    pub fn of(job: &Job) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            state: job.state,
            total_bytes: job.total_bytes,
            processed_bytes: job.processed_bytes,
            total_items: job.total_items,
            processed_items: job.processed_items,
            current_file: job.current_file.clone(),
            errors: job.errors.clone(),
            elapsed: job.elapsed(),
        }
    }

    /// Progress as a percentage (0.0 to 100.0).
    ///
    /// Byte-based when the job transfers bytes, item-based otherwise
    /// (delete jobs count removed entries instead of bytes).
    pub fn percentage(&self) -> f64 {
        if self.state == JobState::Completed {
            100.0
        } else if self.total_bytes > 0 {
            (self.processed_bytes as f64 / self.total_bytes as f64) * 100.0
        } else if self.total_items > 0 {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Transfer rate estimate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.processed_bytes as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Check if the job recorded any per-file errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
