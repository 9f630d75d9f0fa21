//! Configuration for the gammou synthesizer.
//!
//! A [`SynthConfig`] carries everything fixed at synthesizer construction:
//! sample rate, voice pool size, channel counts, the voice retirement
//! thresholds and the overflow policy. Configurations load from and save to
//! TOML.
//!
//! # Example
//!
//! ```rust,no_run
//! use gammou_config::{OverflowPolicy, SynthConfig};
//!
//! let mut config = SynthConfig::load("gammou.toml").unwrap();
//! config.overflow_policy = OverflowPolicy::StealDecaying;
//! config.save("gammou.toml").unwrap();
//! ```

mod error;
mod synth;

pub use error::ConfigError;
pub use synth::{
    DEFAULT_DISAPPEARANCE_SAMPLES, DEFAULT_DISAPPEARANCE_THRESHOLD, DEFAULT_VOICE_COUNT,
    OverflowPolicy, SynthConfig,
};
