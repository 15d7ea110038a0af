//! Job record, status enum, and the status report handed to pollers.

use std::{fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// JobId
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque job identifier: the first 8 hex digits of a v4 UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    const LEN: usize = 8;

    /// Fresh random id.  Uniqueness within a registry is enforced by the
    /// registry, which retries on collision.
    pub(crate) fn generate() -> Self {
        let mut s = Uuid::new_v4().simple().to_string();
        s.truncate(Self::LEN);
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JobStatus
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle: `Started → Processing → {Completed | Failed | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Started,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Started => "started",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No transition ever leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(JobStatus::Started),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable request parameters captured at submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParams {
    pub title: String,
    pub voice: String,
    pub speed: f32,
}

/// Result fields filled in on the `Completed` transition.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutput {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub file_size_bytes: u64,
}

/// One audiobook generation request and its progress.
///
/// The registry owns the canonical record; everything outside it works on
/// clones, so editing a `Job` value never affects the running job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub params: JobParams,
    pub total_chunks: usize,
    /// Chunks synthesised so far; never exceeds `total_chunks`.
    pub current_chunk: usize,
    pub status: JobStatus,
    /// Only set when `status == Failed`.
    pub error_message: Option<String>,
    /// Only set when `status == Completed`.
    pub output: Option<JobOutput>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on the terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
}

impl Job {
    pub(crate) fn new(id: JobId, params: JobParams, total_chunks: usize) -> Self {
        Self {
            id,
            params,
            total_chunks,
            current_chunk: 0,
            status: JobStatus::Started,
            error_message: None,
            output: None,
            started_at: Utc::now(),
            completed_at: None,
            cancel_requested: false,
        }
    }

    /// Progress in percent, rounded to one decimal; `0.0` for an empty job.
    pub fn percent_complete(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        let pct = self.current_chunk as f64 / self.total_chunks as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }

    /// Seconds from start to completion, or to now while still running.
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn file_size_mb(&self) -> Option<f64> {
        self.output
            .as_ref()
            .map(|o| o.file_size_bytes as f64 / (1024.0 * 1024.0))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status report
// ─────────────────────────────────────────────────────────────────────────────

/// Serialisable view of a job, returned by [`AudiobookService::status`].
///
/// [`AudiobookService::status`]: crate::service::AudiobookService::status
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub title: String,
    pub voice: String,
    pub speed: f32,
    pub status: JobStatus,
    pub current_chunk: usize,
    pub total_chunks: usize,
    pub percent_complete: f64,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_mb: Option<f64>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobStatusReport {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            title: job.params.title.clone(),
            voice: job.params.voice.clone(),
            speed: job.params.speed,
            status: job.status,
            current_chunk: job.current_chunk,
            total_chunks: job.total_chunks,
            percent_complete: job.percent_complete(),
            elapsed_seconds: job.elapsed_seconds(),
            error_message: job.error_message.clone(),
            output_path: job.output.as_ref().map(|o| o.path.clone()),
            duration_seconds: job.output.as_ref().map(|o| o.duration_seconds),
            file_size_mb: job.file_size_mb(),
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
