//! Error type shared by every audiobook operation.
//!
//! Only synchronous, caller-facing failures live here (bad input, unknown
//! job ids, settings and config problems).  Failures that happen inside a
//! running synthesis job never cross back to the submitter; the worker
//! records them on the job as a `Failed` status instead.

use std::path::PathBuf;

use crate::job::{JobId, JobStatus};

#[derive(Debug, thiserror::Error)]
pub enum AudiobookError {
    // ── Input errors (rejected before a job exists) ─────────────────────────
    #[error("text is empty")]
    EmptyText,

    #[error("chunking produced no chunks")]
    NoChunks,

    #[error("invalid speed {0}: must be a positive, finite number")]
    InvalidSpeed(f32),

    // ── Lookup errors ──────────────────────────────────────────────────────
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} has no audio yet (status: {status})")]
    NotReady { id: JobId, status: JobStatus },

    // ── Infrastructure ─────────────────────────────────────────────────────
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("settings store error at {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot create output folder {path}: {source}")]
    OutputFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = AudiobookError> = std::result::Result<T, E>;
