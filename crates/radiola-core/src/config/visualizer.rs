//! Visualization configuration

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::DEFAULT_SAMPLE_RATE;

/// Smallest FFT size accepted by the spectrum analyzer
pub const MIN_FFT_SIZE: usize = 64;

/// Largest FFT size accepted by the spectrum analyzer
pub const MAX_FFT_SIZE: usize = 16384;

/// Analyzer sizes and smoothing factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Sample rate of the analyzed stream (follows the engine)
    pub sample_rate: u32,
    /// FFT size, power of two. Default: 2048
    pub fft_size: usize,
    /// Stereo pairs kept by the waveform buffer. Default: 1024
    pub waveform_samples: usize,
    /// Per-block peak decay multiplier (0..1). Default: 0.95
    pub peak_decay: f32,
    /// RMS smoothing factor (0 = none). Default: 0.3
    pub rms_smoothing: f32,
    /// Spectrum smoothing across pulls (0 = none). Default: 0.5
    pub spectrum_smoothing: f32,
    /// How long the held peak stays before decaying, in milliseconds. Default: 1500
    pub peak_hold_ms: u32,
    /// Apply a Hann window before the FFT. Default: true
    pub window_enabled: bool,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            fft_size: 2048,
            waveform_samples: 1024,
            peak_decay: 0.95,
            rms_smoothing: 0.3,
            spectrum_smoothing: 0.5,
            peak_hold_ms: 1500,
            window_enabled: true,
        }
    }
}

impl VisualizerConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.sample_rate == 0 {
            return Err(CoreError::InvalidArgument(
                "visualizer sample rate must be positive".to_string(),
            ));
        }
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(CoreError::InvalidArgument(format!(
                "FFT size must be a power of two in {}..={}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, self.fft_size
            )));
        }
        if self.waveform_samples == 0 {
            return Err(CoreError::InvalidArgument(
                "waveform sample count must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("peak decay", self.peak_decay),
            ("RMS smoothing", self.rms_smoothing),
            ("spectrum smoothing", self.spectrum_smoothing),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(CoreError::InvalidArgument(format!(
                    "{} must be in [0, 1), got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Set the FFT size
    pub fn with_fft_size(mut self, fft_size: usize) -> Self {
        self.fft_size = fft_size;
        self
    }

    /// Set the waveform buffer length
    pub fn with_waveform_samples(mut self, samples: usize) -> Self {
        self.waveform_samples = samples;
        self
    }

    /// Set the analyzed sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_power_of_two_fft_rejected() {
        let config = VisualizerConfig::default().with_fft_size(1000);
        assert!(matches!(config.validate(), Err(CoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_smoothing_of_one_rejected() {
        let config = VisualizerConfig {
            rms_smoothing: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
