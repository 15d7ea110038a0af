//! Speech engine seam.
//!
//! The synthesis worker only needs one operation from an engine: turn a
//! chunk of text into audio samples.  [`CommandEngine`] implements it by
//! running an external TTS program once per chunk, which covers piper,
//! espeak-ng, or a wrapper script around any model.

use std::{
    io::{Cursor, Write},
    path::PathBuf,
    process::{Command, Stdio},
    sync::{Mutex, PoisonError},
    thread,
};

use anyhow::{bail, Context, Result};

/// Sample rate every engine is expected to produce, in Hz.
pub const SAMPLE_RATE: u32 = 24_000;

/// A text-to-speech backend.
///
/// Implementations must tolerate repeated sequential calls.  The worker
/// never calls one engine concurrently for the same job, but separate jobs
/// may share an engine, so implementations serialise internally if the
/// underlying resource is single-threaded.
pub trait SpeechEngine: Send + Sync {
    /// Synthesise `text` as a sequence of mono `f32` sample buffers.
    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<Vec<f32>>>;

    /// Sample rate of the buffers returned by [`synthesize`](Self::synthesize).
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CommandEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Runs an external program per chunk.
///
/// The chunk text is written to the program's stdin and a complete WAV
/// stream is read back from its stdout.  `{voice}` and `{speed}` in any
/// argument are replaced with the job's values, e.g.
///
/// ```text
/// piper --model {voice}.onnx --length_scale {speed} --output_file -
/// ```
#[derive(Debug)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
    sample_rate: u32,
    /// Serialises every call into the program.
    lock: Mutex<()>,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            sample_rate: SAMPLE_RATE,
            lock: Mutex::new(()),
        }
    }

    /// Expect a sample rate other than [`SAMPLE_RATE`] from the program.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    fn expand_args(&self, voice: &str, speed: f32) -> Vec<String> {
        let speed = speed.to_string();
        self.args
            .iter()
            .map(|a| a.replace("{voice}", voice).replace("{speed}", &speed))
            .collect()
    }
}

impl SpeechEngine for CommandEngine {
    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<Vec<f32>>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut child = Command::new(&self.program)
            .args(self.expand_args(voice, speed))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Cannot start TTS program {}", self.program.display()))?;

        // Feed stdin from its own thread while stdout is drained here, so a
        // program that streams output before reading all input cannot stall.
        let mut stdin = child.stdin.take().context("TTS program stdin not captured")?;
        let (fed, output) = thread::scope(|s| {
            let feeder = s.spawn(move || stdin.write_all(text.as_bytes()));
            let output = child.wait_with_output();
            (feeder.join(), output)
        });

        let output = output.context("Failed to wait for TTS program")?;
        if !output.status.success() {
            bail!(
                "TTS program {} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        match fed {
            Ok(result) => result.context("Failed to send text to TTS program")?,
            Err(_) => bail!("TTS stdin writer panicked"),
        }

        decode_wav(&output.stdout, self.sample_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Decode an in-memory WAV stream into one mono `f32` buffer.
///
/// Integer PCM is scaled to `[-1.0, 1.0]`; multi-channel audio is averaged
/// down to mono.  An empty data chunk yields no buffers.
pub fn decode_wav(bytes: &[u8], expected_rate: u32) -> Result<Vec<Vec<f32>>> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .context("TTS program output is not a WAV stream")?;
    let spec = reader.spec();
    if spec.sample_rate != expected_rate {
        bail!(
            "TTS program produced {} Hz audio, expected {} Hz",
            spec.sample_rate,
            expected_rate
        );
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Corrupt float WAV data")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Corrupt PCM WAV data")?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let mono: Vec<f32> = if channels == 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if mono.is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![mono])
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process engines for tests
// ─────────────────────────────────────────────────────────────────────────────


// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
