//! Console configuration
//!
//! Fixed startup parameters for the engine, ducking and visualization,
//! loaded from a single YAML file:
//!
//! ```yaml
//! audio:
//!   sample_rate: 48000
//!   channels: 2
//!   buffer_size: !Fixed 512
//!   tap_buffer_ms: 500
//! ducking:
//!   duck_percentage: 20
//!   policy: FadeSmooth
//!   attack_ms: 150
//!   release_ms: 600
//! visualizer:
//!   fft_size: 2048
//!   waveform_samples: 1024
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use radiola_core::config::{load_config, default_config_path, ConsoleConfig};
//!
//! let config: ConsoleConfig = load_config(&default_config_path());
//! config.validate()?;
//! ```

mod ducking;
mod io;
mod paths;
mod visualizer;

use serde::{Deserialize, Serialize};

pub use crate::audio::{AudioConfig, BufferSize};
pub use ducking::{DuckPolicy, DuckingConfig};
pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
pub use visualizer::VisualizerConfig;

use crate::error::CoreResult;

/// Complete console configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Engine startup parameters
    pub audio: AudioConfig,
    /// Ducking policy and depth
    pub ducking: DuckingConfig,
    /// Analyzer sizes and smoothing
    pub visualizer: VisualizerConfig,
}

impl ConsoleConfig {
    /// Validate every section
    pub fn validate(&self) -> CoreResult<()> {
        self.audio.validate()?;
        self.ducking.validate()?;
        self.visualizer.validate()
    }

    /// Visualizer settings with the sample rate taken from the engine section
    pub fn visualizer_for_engine(&self) -> VisualizerConfig {
        VisualizerConfig {
            sample_rate: self.audio.sample_rate,
            ..self.visualizer.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConsoleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "ducking:\n  duck_percentage: 35\n  policy: Instant\n";
        let config: ConsoleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.ducking.duck_percentage, 35);
        assert_eq!(config.ducking.policy, DuckPolicy::Instant);
        assert_eq!(config.ducking.attack_ms, DuckingConfig::default().attack_ms);
        assert_eq!(config.audio, AudioConfig::default());
    }

    #[test]
    fn test_visualizer_follows_engine_rate() {
        let mut config = ConsoleConfig::default();
        config.audio.sample_rate = 44100;
        assert_eq!(config.visualizer_for_engine().sample_rate, 44100);
    }
}
