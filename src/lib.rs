//! # tts-audiobook
//!
//! Turns long-form text into a single audiobook WAV file by chunking it,
//! synthesising each chunk through a text-to-speech engine, and stitching
//! the audio back together.  Generation runs as a background job that can be
//! polled for progress and cancelled at any time.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tts_audiobook::{AudiobookConfig, AudiobookService, CommandEngine, MemorySettingsStore};
//!
//! // Any program that reads text on stdin and writes a 24 kHz WAV to stdout.
//! let engine = CommandEngine::new("piper", vec![
//!     "--model".into(), "{voice}.onnx".into(), "--output_file".into(), "-".into(),
//! ]);
//! let settings = MemorySettingsStore::new();
//! let service = AudiobookService::from_settings(
//!     Arc::new(engine),
//!     &settings,
//!     AudiobookConfig::default(),
//! ).unwrap();
//!
//! let id = service.submit("Call me Ishmael. Some years ago.", "Moby-Dick", "en_US-amy", 1.0).unwrap();
//! let report = service.status(&id).unwrap();
//! println!("{}: {}%", report.status, report.percent_complete);
//! ```
//!
//! ## Pipeline
//! 1. **Segmentation** — whitespace-normalised text split into sentences.
//! 2. **Chunking** — sentences packed into ≤ 1 500-char chunks, never split
//!    mid-sentence unless one sentence alone is too long.
//! 3. **Registration** — a `Started` job is added to the [`JobRegistry`].
//! 4. **Synthesis** — a worker thread runs each chunk through the
//!    [`SpeechEngine`] in order, publishing progress after every chunk and
//!    checking for cancellation in between.
//! 5. **Write** — samples concatenated and saved as 16-bit PCM WAV.

pub mod audio;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod registry;
pub mod segment;
pub mod service;
pub mod settings;
pub mod worker;

#[cfg(feature = "server")]
pub mod server;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use audio::{AudioWriter, WavWriter};
pub use chunk::{chunk_text, DEFAULT_MAX_CHUNK_CHARS};
pub use config::AudiobookConfig;
pub use engine::{CommandEngine, SpeechEngine, SAMPLE_RATE};
pub use error::{AudiobookError, Result};
pub use job::{Job, JobId, JobParams, JobStatus, JobStatusReport};
pub use registry::JobRegistry;
pub use segment::split_into_sentences;
pub use service::AudiobookService;
pub use settings::{JsonSettingsStore, MemorySettingsStore, SettingsStore};

/// Crate version, as reported by the server's `/health` endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `"tts-audiobook <version>"`.
pub fn version_string() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), VERSION)
}
