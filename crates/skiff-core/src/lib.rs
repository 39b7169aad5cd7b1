//! Core types for the skiff file-operation engine.
//!
//! This crate provides the fundamental data structures shared across the
//! skiff workspace: job records, progress snapshots, engine configuration,
//! and the operation error type.

mod config;
mod error;
mod job;
mod snapshot;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{FileError, OpsError};
pub use job::{Job, JobEntry, JobId, JobKind, JobRequest, JobState};
pub use snapshot::ProgressSnapshot;
