//! Pipeline configuration, loadable from a JSON file.
//!
//! Every field has a default, so `{}` is a valid config file.

use std::{fs, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    chunk::DEFAULT_MAX_CHUNK_CHARS,
    engine::SAMPLE_RATE,
    error::{AudiobookError, Result},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudiobookConfig {
    /// Per-chunk character budget handed to the chunk builder.
    pub max_chunk_chars: usize,

    /// Sample rate used for the output WAV and duration reporting.
    pub sample_rate: u32,

    /// Voice used when a request does not name one.
    pub default_voice: String,

    /// Speed multiplier used when a request does not give one.
    pub default_speed: f32,

    /// Finished jobs older than this are dropped by a sweep.
    pub retention_secs: u64,

    /// How often the server runs a sweep.
    pub sweep_interval_secs: u64,

    /// Overrides the settings-store output folder when set.
    pub output_dir: Option<PathBuf>,
}

impl Default for AudiobookConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            sample_rate: SAMPLE_RATE,
            default_voice: "default".to_string(),
            default_speed: 1.0,
            retention_secs: 3600,
            sweep_interval_secs: 300,
            output_dir: None,
        }
    }
}

impl AudiobookConfig {
    /// Read and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            AudiobookError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|e| {
            AudiobookError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(AudiobookError::Config("max_chunk_chars must be > 0".into()));
        }
        if self.sample_rate == 0 {
            return Err(AudiobookError::Config("sample_rate must be > 0".into()));
        }
        if !(self.default_speed.is_finite() && self.default_speed > 0.0) {
            return Err(AudiobookError::Config(format!(
                "default_speed must be positive, got {}",
                self.default_speed
            )));
        }
        Ok(())
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config: AudiobookConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AudiobookConfig::default());
        assert_eq!(config.max_chunk_chars, 1500);
        assert_eq!(config.sample_rate, 24_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config: AudiobookConfig =
            serde_json::from_str(r#"{"max_chunk_chars": 400, "default_voice": "Jasper"}"#).unwrap();
        assert_eq!(config.max_chunk_chars, 400);
        assert_eq!(config.default_voice, "Jasper");
        assert_eq!(config.retention(), Duration::from_secs(3600));
    }

    #[test]
    fn test_validation() {
        let bad_chunk = AudiobookConfig { max_chunk_chars: 0, ..Default::default() };
        assert!(bad_chunk.validate().is_err());
        let bad_speed = AudiobookConfig { default_speed: f32::NAN, ..Default::default() };
        assert!(bad_speed.validate().is_err());
        let bad_rate = AudiobookConfig { sample_rate: 0, ..Default::default() };
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"retention_secs": 60}"#).unwrap();
        let config = AudiobookConfig::from_file(&path).unwrap();
        assert_eq!(config.retention_secs, 60);

        fs::write(&path, r#"{"max_chunk_chars": 0}"#).unwrap();
        assert!(matches!(
            AudiobookConfig::from_file(&path),
            Err(AudiobookError::Config(_))
        ));
        assert!(AudiobookConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
