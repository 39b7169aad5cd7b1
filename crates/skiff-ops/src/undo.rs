//! Natural reversal of the most recent copy or move.

use std::collections::BTreeMap;
use std::path::PathBuf;

use skiff_core::{Job, JobKind, JobRequest};

/// What the last reversible job did.
#[derive(Debug, Clone)]
pub enum UndoEntry {
    /// Paths created by a copy; reversal deletes them.
    Copied { created: Vec<PathBuf> },
    /// (source, destination) pairs of a move; reversal moves them back.
    Moved { moves: Vec<(PathBuf, PathBuf)> },
}

/// Single-slot log of the most recent reversible job.
///
/// Only copy and move jobs are recorded: a permanent deletion has no
/// reversal, so delete jobs leave the slot untouched.
#[derive(Debug, Default)]
pub struct UndoLog {
    last: Option<UndoEntry>,
}

impl UndoLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal job's completed entries.
    ///
    /// Partially-failed jobs are recorded too: their completed entries are
    /// the reversible part.
    pub fn record(&mut self, job: &Job) {
        if !job.state.is_terminal() || job.completed.is_empty() {
            return;
        }
        match job.kind {
            JobKind::Copy => {
                self.last = Some(UndoEntry::Copied {
                    created: job.completed.iter().map(|(_, dest)| dest.clone()).collect(),
                });
            }
            JobKind::Move => {
                self.last = Some(UndoEntry::Moved {
                    moves: job.completed.clone(),
                });
            }
            JobKind::Delete => {}
        }
    }

    /// Consume the entry, producing the requests that reverse it.
    ///
    /// A reversed move fans out into one request per original parent
    /// directory, since entries may have been cut from different places.
    pub fn undo(&mut self) -> Vec<JobRequest> {
        match self.last.take() {
            None => Vec::new(),
            Some(UndoEntry::Copied { created }) => vec![JobRequest::delete(created, false)],
            Some(UndoEntry::Moved { moves }) => {
                let mut by_parent: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
                for (source, dest) in moves {
                    if let Some(parent) = source.parent() {
                        by_parent.entry(parent.to_path_buf()).or_default().push(dest);
                    }
                }
                by_parent
                    .into_iter()
                    .map(|(parent, sources)| JobRequest::move_to(sources, parent))
                    .collect()
            }
        }
    }

    /// The pending entry, if any.
    pub fn last(&self) -> Option<&UndoEntry> {
        self.last.as_ref()
    }

    /// Whether there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }
}
