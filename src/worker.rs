//! Background synthesis worker — one per job.
//!
//! State machine driven here:
//!
//! ```text
//! Started ──► Processing ──┬──► Completed
//!                          ├──► Failed
//!                          └──► Cancelled
//! ```
//!
//! Chunks are synthesised strictly in order, one at a time.  Cancellation is
//! cooperative: the flag is checked before every chunk and once more before
//! the file is written; a chunk already inside the engine runs to completion.

use std::{
    fs,
    io,
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};

use crate::{
    audio::{concat_buffers, duration_seconds, AudioWriter},
    engine::SpeechEngine,
    job::JobOutput,
    registry::JobHandle,
};

/// Collaborators a worker needs besides its job.
#[derive(Clone)]
pub struct WorkerContext {
    pub engine: Arc<dyn SpeechEngine>,
    pub writer: Arc<dyn AudioWriter>,
    pub output_dir: PathBuf,
}

/// Output file name for a job.
pub fn output_file_name(handle: &JobHandle) -> String {
    format!("audiobook-{}.wav", handle.id())
}

// ─────────────────────────────────────────────────────────────────────────────
// Finaliser
// ─────────────────────────────────────────────────────────────────────────────

/// Guarantees a terminal status even if the worker unwinds mid-job.
struct FinalizeGuard<'a>(&'a JobHandle);

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        if !self.0.is_terminal() {
            tracing::error!(job_id = %self.0.id(), "worker exited without a terminal status");
            self.0.fail("synthesis worker terminated unexpectedly");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker
// ─────────────────────────────────────────────────────────────────────────────

/// Run the worker for `handle` on its own named thread.
pub fn spawn_worker(
    handle: JobHandle,
    chunks: Vec<String>,
    ctx: WorkerContext,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("audiobook-{}", handle.id()))
        .spawn(move || run_job(&handle, &chunks, &ctx))
}

/// Drive one job from `Started` to a terminal status on the current thread.
///
/// Never returns an error: every failure ends up as the job's `Failed`
/// status and message.
pub fn run_job(handle: &JobHandle, chunks: &[String], ctx: &WorkerContext) {
    let span = tracing::info_span!("audiobook_job", job_id = %handle.id());
    let _enter = span.enter();
    let _guard = FinalizeGuard(handle);

    if !handle.mark_processing() {
        tracing::warn!("job is not in Started state; worker not run");
        return;
    }
    tracing::info!(chunks = chunks.len(), "synthesis started");

    if let Err(e) = process(handle, chunks, ctx) {
        let message = format!("{e:#}");
        tracing::warn!(error = %message, "synthesis failed");
        handle.fail(message);
    }
}

fn process(handle: &JobHandle, chunks: &[String], ctx: &WorkerContext) -> Result<()> {
    let params = handle.snapshot().params;
    let total = chunks.len();
    let mut buffers: Vec<Vec<f32>> = Vec::new();

    for (i, chunk) in chunks.iter().enumerate() {
        if handle.is_cancel_requested() {
            tracing::info!(chunks_done = i, "cancelled");
            handle.cancel();
            return Ok(());
        }

        let audio = ctx
            .engine
            .synthesize(chunk, &params.voice, params.speed)
            .with_context(|| format!("Synthesis failed on chunk {}/{}", i + 1, total))?;
        buffers.extend(audio.into_iter().filter(|b| !b.is_empty()));

        handle.advance(i + 1);
        tracing::debug!(chunk = i + 1, total, "chunk synthesised");
    }

    if handle.is_cancel_requested() {
        tracing::info!(chunks_done = total, "cancelled before writing");
        handle.cancel();
        return Ok(());
    }

    let samples = concat_buffers(buffers);
    if samples.is_empty() {
        tracing::warn!("engine produced no audio");
        handle.fail("No audio generated");
        return Ok(());
    }

    let sample_rate = ctx.engine.sample_rate();
    let path = ctx.output_dir.join(output_file_name(handle));
    if let Err(e) = ctx.writer.write(&path, &samples, sample_rate) {
        let _ = fs::remove_file(&path);
        return Err(e.context("Failed to write audiobook"));
    }
    let file_size_bytes = fs::metadata(&path)
        .with_context(|| format!("Cannot stat {}", path.display()))?
        .len();

    let output = JobOutput {
        path: path.clone(),
        duration_seconds: duration_seconds(samples.len(), sample_rate),
        file_size_bytes,
    };
    let duration = output.duration_seconds;
    if handle.complete(output) {
        tracing::info!(path = %path.display(), duration, file_size_bytes, "audiobook completed");
    } else {
        // A cancel landed between the last checkpoint and completion.
        tracing::info!("cancelled after write; removing output");
        let _ = fs::remove_file(&path);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
