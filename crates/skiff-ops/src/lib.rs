//! Asynchronous file-operation engine for skiff.
//!
//! This crate executes clipboard-driven copy, move, and delete requests
//! against the filesystem: one worker task per job, deterministic
//! destination-name conflict resolution, poll-safe progress snapshots, and
//! cooperative cancellation that leaves no partial artifacts behind.

mod clipboard;
mod conflict;
mod executor;
mod progress;
mod queue;
mod undo;

pub use clipboard::{Clipboard, ClipboardMode};
pub use conflict::resolve_collision;
pub use progress::ProgressReporter;
pub use queue::{EngineEvent, JobQueue};
pub use undo::{UndoEntry, UndoLog};

/// Buffer size of the engine event channel.
pub const EVENT_CHANNEL_SIZE: usize = 100;
