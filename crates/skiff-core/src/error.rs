//! Error types for file operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while driving the operation engine.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Paste was requested with nothing on the clipboard.
    #[error("Clipboard is empty")]
    EmptyClipboard,

    /// Source path does not exist.
    #[error("Source not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// The destination volume ran out of space.
    #[error("Insufficient space writing {path}")]
    InsufficientSpace { path: PathBuf },

    /// No free destination name was found within the attempt bound.
    #[error("No free name for {path} after {attempts} attempts")]
    ConflictResolutionExhausted { path: PathBuf, attempts: u32 },

    /// Destination size did not match the source after a copy.
    #[error("Size mismatch for {path}: expected {expected} bytes, wrote {actual}")]
    VerificationMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OpsError {
    /// Create an I/O error with path context, classifying well-known kinds.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::SourceNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::StorageFull => Self::InsufficientSpace { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether this error is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// An error recorded against a single file during a job.
///
/// Per-file errors never abort the surrounding job; they accumulate on the
/// job record and are surfaced with its terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// The path that caused the error.
    pub path: PathBuf,
    /// A human-readable error message.
    pub message: String,
}

impl FileError {
    /// Create a new file error.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}
