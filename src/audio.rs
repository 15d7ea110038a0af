//! Audio persistence — the writer seam and the default WAV writer.

use std::path::Path;

use anyhow::{Context, Result};

/// Persists concatenated samples as a playable file.
pub trait AudioWriter: Send + Sync {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// WavWriter
// ─────────────────────────────────────────────────────────────────────────────

/// Writes mono 16-bit PCM WAV files.
///
/// 16-bit PCM rather than 32-bit float: Android's `MediaPlayer` and several
/// browser players accept a float WAV header but play silence.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavWriter;

impl AudioWriter for WavWriter {
    fn write(&self, path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Cannot create WAV: {}", path.display()))?;
        for &s in samples {
            // f32 [-1.0, 1.0] → i16 [-32768, 32767], clipping anything louder.
            let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(s16).context("WAV write error")?;
        }
        writer.finalize().context("WAV finalise error")?;
        tracing::debug!(
            samples = samples.len(),
            seconds = duration_seconds(samples.len(), sample_rate),
            path = %path.display(),
            "wrote WAV"
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Flatten per-chunk buffers into one waveform, preserving order.
pub fn concat_buffers(buffers: Vec<Vec<f32>>) -> Vec<f32> {
    let total = buffers.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    for buf in buffers {
        out.extend(buf);
    }
    out
}

/// Playback length of `samples` mono samples at `sample_rate` Hz.
pub fn duration_seconds(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 / f64::from(sample_rate)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_preserves_order() {
        let out = concat_buffers(vec![vec![1.0, 2.0], vec![], vec![3.0]]);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration_seconds(48_000, 24_000), 2.0);
        assert_eq!(duration_seconds(12_000, 24_000), 0.5);
        assert_eq!(duration_seconds(10, 0), 0.0);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        WavWriter.write(&path, &[0.0, 0.5, -1.0, 2.0], 24_000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -32767, 32767]);
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.wav");
        assert!(WavWriter.write(&path, &[0.1], 24_000).is_err());
    }
}
