//! Synthesizer configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// Default number of voices in the polyphonic pool.
pub const DEFAULT_VOICE_COUNT: usize = 16;

/// Default output magnitude under which a voice counts as silent.
pub const DEFAULT_DISAPPEARANCE_THRESHOLD: f32 = 0.0003;

/// Default number of consecutive silent samples before a voice is retired.
pub const DEFAULT_DISAPPEARANCE_SAMPLES: u32 = 400;

/// What the synthesizer does with a note-on when every voice is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Ignore the note.
    #[default]
    Drop,
    /// Retire the oldest decaying voice, if any, and reuse it.
    StealDecaying,
}

/// Construction parameters of a synthesizer.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// voice_count = 8
/// overflow_policy = "steal_decaying"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Size of the fixed voice pool.
    pub voice_count: usize,
    /// External input channels fed to the master circuit.
    pub input_count: usize,
    /// Output channels produced by the master circuit.
    pub output_count: usize,
    /// Magnitude under which a voice's output counts as silent.
    pub voice_disappearance_threshold: f32,
    /// Consecutive silent samples after which a voice is retired.
    pub voice_disappearance_samples: u32,
    /// Behavior when the voice pool is exhausted.
    pub overflow_policy: OverflowPolicy,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            voice_count: DEFAULT_VOICE_COUNT,
            input_count: 0,
            output_count: 2,
            voice_disappearance_threshold: DEFAULT_DISAPPEARANCE_THRESHOLD,
            voice_disappearance_samples: DEFAULT_DISAPPEARANCE_SAMPLES,
            overflow_policy: OverflowPolicy::Drop,
        }
    }
}

impl SynthConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: SynthConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Check that the synthesizer can be built from this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("sample_rate", "must be positive"));
        }
        if self.voice_count == 0 {
            return Err(ConfigError::invalid("voice_count", "must be at least 1"));
        }
        if self.output_count == 0 {
            return Err(ConfigError::invalid("output_count", "must be at least 1"));
        }
        let threshold = self.voice_disappearance_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::invalid(
                "voice_disappearance_threshold",
                format!("{threshold} is not a finite, non-negative magnitude"),
            ));
        }
        Ok(())
    }

    /// Sample rate as `f32`, the form node factories take.
    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate as f32
    }
}
