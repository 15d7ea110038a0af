//! Caller-facing facade: submit, poll, cancel, sweep.
//!
//! None of these calls wait on synthesis.  `submit` returns as soon as the
//! text is chunked and the worker thread is running; the others only touch
//! the registry.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    audio::{AudioWriter, WavWriter},
    chunk::chunk_text,
    config::AudiobookConfig,
    engine::SpeechEngine,
    error::{AudiobookError, Result},
    job::{JobId, JobParams, JobStatus, JobStatusReport},
    registry::JobRegistry,
    settings::{output_folder, SettingsStore},
    worker::{spawn_worker, WorkerContext},
};

pub struct AudiobookService {
    registry: Arc<JobRegistry>,
    ctx: WorkerContext,
    config: AudiobookConfig,
}

impl AudiobookService {
    pub fn new(
        registry: Arc<JobRegistry>,
        engine: Arc<dyn SpeechEngine>,
        writer: Arc<dyn AudioWriter>,
        output_dir: PathBuf,
        config: AudiobookConfig,
    ) -> Self {
        Self {
            registry,
            ctx: WorkerContext { engine, writer, output_dir },
            config,
        }
    }

    /// Build a service writing WAV files to the configured output folder.
    ///
    /// `config.output_dir` wins; otherwise the folder comes from `settings`,
    /// falling back to the default under the home directory.  The folder is
    /// created if it does not exist.
    pub fn from_settings(
        engine: Arc<dyn SpeechEngine>,
        settings: &dyn SettingsStore,
        config: AudiobookConfig,
    ) -> Result<Self> {
        config.validate()?;
        let output_dir = match &config.output_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| AudiobookError::OutputFolder {
                    path: dir.clone(),
                    source,
                })?;
                dir.clone()
            }
            None => output_folder(settings)?,
        };
        tracing::info!(output_dir = %output_dir.display(), "audiobook output folder");
        Ok(Self::new(
            Arc::new(JobRegistry::new()),
            engine,
            Arc::new(WavWriter),
            output_dir,
            config,
        ))
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &AudiobookConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.ctx.output_dir
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Chunk `text`, register a job, and start its worker.
    ///
    /// Input errors are reported here, before any job exists.  Everything
    /// that goes wrong later is recorded on the job instead.
    pub fn submit(&self, text: &str, title: &str, voice: &str, speed: f32) -> Result<JobId> {
        if text.trim().is_empty() {
            return Err(AudiobookError::EmptyText);
        }
        if !(speed.is_finite() && speed > 0.0) {
            return Err(AudiobookError::InvalidSpeed(speed));
        }

        let chunks = chunk_text(text, self.config.max_chunk_chars);
        if chunks.is_empty() {
            return Err(AudiobookError::NoChunks);
        }

        let params = JobParams {
            title: title.to_string(),
            voice: voice.to_string(),
            speed,
        };
        let handle = self.registry.create(params, chunks.len());
        let id = handle.id().clone();
        tracing::info!(job_id = %id, title, voice, speed, chunks = chunks.len(), "audiobook job submitted");

        // Detached: the worker reports through the registry, not the handle.
        if let Err(e) = spawn_worker(handle, chunks, self.ctx.clone()) {
            self.registry.discard(&id);
            return Err(AudiobookError::Spawn(e));
        }
        Ok(id)
    }

    /// Current status of a job.
    pub fn status(&self, id: &JobId) -> Result<JobStatusReport> {
        self.registry
            .get(id)
            .map(|job| JobStatusReport::from(&job))
            .ok_or_else(|| AudiobookError::NotFound(id.clone()))
    }

    /// Request cooperative cancellation.  `true` if the job was still running.
    pub fn cancel(&self, id: &JobId) -> bool {
        let requested = self.registry.request_cancel(id);
        if requested {
            tracing::info!(job_id = %id, "cancellation requested");
        }
        requested
    }

    /// Drop finished jobs older than `max_age_secs`.
    pub fn sweep(&self, max_age_secs: u64) -> usize {
        let removed = self.registry.sweep(Duration::from_secs(max_age_secs));
        if removed > 0 {
            tracing::debug!(removed, "swept finished jobs");
        }
        removed
    }

    /// [`sweep`](Self::sweep) with the configured retention.
    pub fn sweep_expired(&self) -> usize {
        self.sweep(self.config.retention_secs)
    }

    /// Path of a completed job's WAV file.
    pub fn audio_path(&self, id: &JobId) -> Result<PathBuf> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| AudiobookError::NotFound(id.clone()))?;
        match (job.status, job.output) {
            (JobStatus::Completed, Some(output)) => Ok(output.path),
            (status, _) => Err(AudiobookError::NotReady { id: id.clone(), status }),
        }
    }

    /// Status of every tracked job, oldest first.
    pub fn jobs(&self) -> Vec<JobStatusReport> {
        self.registry.list().iter().map(JobStatusReport::from).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
