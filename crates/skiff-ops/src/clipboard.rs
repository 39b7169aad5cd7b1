//! Clipboard: the current selection and interaction mode.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use skiff_core::{JobRequest, OpsError};

/// How pasted entries interact with their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipboardMode {
    /// Paste copies; the clipboard persists for repeated pastes.
    #[default]
    Copy,
    /// Paste moves; the clipboard is cleared the moment the paste is issued.
    Cut,
}

/// The current selection: an ordered set of source paths plus a mode.
///
/// Owned by the interface layer, which is single-threaded; the engine only
/// ever receives the request produced by [`Clipboard::paste`], so a job in
/// flight is never affected by later clipboard mutation.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    paths: IndexSet<PathBuf>,
    mode: ClipboardMode,
}

impl Clipboard {
    /// Create an empty clipboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection in copy mode. Duplicates are dropped, order kept.
    pub fn set_copy(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.paths = paths.into_iter().collect();
        self.mode = ClipboardMode::Copy;
    }

    /// Replace the selection in cut mode. Duplicates are dropped, order kept.
    pub fn set_cut(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.paths = paths.into_iter().collect();
        self.mode = ClipboardMode::Cut;
    }

    /// Produce the operation request for pasting into `dest_dir`.
    ///
    /// Copy mode keeps the selection so the paste can be repeated. Cut mode
    /// clears it immediately ("move and forget"): the resulting job proceeds
    /// independently, and a failed move does not restore the clipboard.
    pub fn paste(&mut self, dest_dir: impl Into<PathBuf>) -> Result<JobRequest, OpsError> {
        if self.paths.is_empty() {
            return Err(OpsError::EmptyClipboard);
        }
        let dest_dir = dest_dir.into();
        match self.mode {
            ClipboardMode::Copy => Ok(JobRequest::copy(
                self.paths.iter().cloned().collect(),
                dest_dir,
            )),
            ClipboardMode::Cut => {
                let sources: Vec<PathBuf> = self.paths.drain(..).collect();
                Ok(JobRequest::move_to(sources, dest_dir))
            }
        }
    }

    /// Drop the selection.
    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Current interaction mode.
    pub fn mode(&self) -> ClipboardMode {
        self.mode
    }

    /// Whether anything is selected.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Number of selected paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Selected paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}
