//! Level meter - peak, RMS, peak hold and clipping per channel
//!
//! Keeps only smoothing state; no samples are retained between blocks.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::VisualizerConfig;
use crate::types::as_stereo_frames;

/// Floor returned by [`linear_to_db`] for silence
pub const DB_FLOOR: f32 = -96.0;

/// Absolute sample value treated as clipping
pub const CLIP_THRESHOLD: f32 = 0.999;

/// Convert a linear amplitude to dBFS, floored at -96 dB
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        (20.0 * linear.log10()).max(DB_FLOOR)
    } else {
        DB_FLOOR
    }
}

/// Meter snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelData {
    pub left_peak: f32,
    pub right_peak: f32,
    pub left_rms: f32,
    pub right_rms: f32,
    pub left_peak_db: f32,
    pub right_peak_db: f32,
    pub left_rms_db: f32,
    pub right_rms_db: f32,
    /// Held peaks (linear)
    pub peak_hold_left: f32,
    pub peak_hold_right: f32,
    /// max(left_peak, right_peak)
    pub mono_peak: f32,
    /// Average of left and right RMS
    pub mono_rms: f32,
    /// Last block reached full scale
    pub clipping: bool,
    pub timestamp: DateTime<Utc>,
}

/// Per-channel smoothing state
#[derive(Debug, Clone, Copy, Default)]
struct ChannelMeter {
    peak: f32,
    rms: f32,
    hold: f32,
    /// Frames left before the held peak starts decaying
    hold_remaining: u64,
}

impl ChannelMeter {
    fn update(&mut self, block_peak: f32, block_rms: f32, frames: u64, settings: &MeterSettings) {
        // Peak falls by the decay factor per block but never below the new block peak
        self.peak = block_peak.max(self.peak * settings.peak_decay);
        self.rms = settings.rms_smoothing * self.rms + (1.0 - settings.rms_smoothing) * block_rms;

        if self.peak >= self.hold {
            self.hold = self.peak;
            self.hold_remaining = settings.hold_frames;
        } else if self.hold_remaining > frames {
            self.hold_remaining -= frames;
        } else {
            self.hold_remaining = 0;
            self.hold = (self.hold * settings.peak_decay).max(self.peak);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MeterSettings {
    peak_decay: f32,
    rms_smoothing: f32,
    hold_frames: u64,
}

/// Stereo level meter
#[derive(Debug, Clone)]
pub struct LevelMeter {
    settings: MeterSettings,
    left: ChannelMeter,
    right: ChannelMeter,
    clipping: bool,
}

impl LevelMeter {
    pub fn new(config: &VisualizerConfig) -> Self {
        Self {
            settings: MeterSettings {
                peak_decay: config.peak_decay,
                rms_smoothing: config.rms_smoothing,
                hold_frames: config.peak_hold_ms as u64 * config.sample_rate as u64 / 1000,
            },
            left: ChannelMeter::default(),
            right: ChannelMeter::default(),
            clipping: false,
        }
    }

    /// Feed an interleaved stereo block (a trailing unpaired sample is ignored)
    pub fn process(&mut self, samples: &[f32]) {
        let frames = as_stereo_frames(samples);
        if frames.is_empty() {
            return;
        }

        let mut peak = [0.0f32; 2];
        let mut sum_sq = [0.0f32; 2];
        for frame in frames {
            peak[0] = peak[0].max(frame.left.abs());
            peak[1] = peak[1].max(frame.right.abs());
            sum_sq[0] += frame.left * frame.left;
            sum_sq[1] += frame.right * frame.right;
        }
        let count = frames.len();
        let rms = sum_sq.map(|sum| (sum / count as f32).sqrt());

        self.left.update(peak[0], rms[0], count as u64, &self.settings);
        self.right.update(peak[1], rms[1], count as u64, &self.settings);
        self.clipping = peak[0] >= CLIP_THRESHOLD || peak[1] >= CLIP_THRESHOLD;
    }

    /// Snapshot of the current meter state
    pub fn level_data(&self) -> LevelData {
        let (left, right) = (self.left, self.right);
        LevelData {
            left_peak: left.peak,
            right_peak: right.peak,
            left_rms: left.rms,
            right_rms: right.rms,
            left_peak_db: linear_to_db(left.peak),
            right_peak_db: linear_to_db(right.peak),
            left_rms_db: linear_to_db(left.rms),
            right_rms_db: linear_to_db(right.rms),
            peak_hold_left: left.hold,
            peak_hold_right: right.hold,
            mono_peak: left.peak.max(right.peak),
            mono_rms: (left.rms + right.rms) / 2.0,
            clipping: self.clipping,
            timestamp: Utc::now(),
        }
    }

    pub fn reset(&mut self) {
        self.left = ChannelMeter::default();
        self.right = ChannelMeter::default();
        self.clipping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine_block(amplitude: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let s = amplitude * (TAU * i as f32 / 48.0).sin();
                [s, s]
            })
            .collect()
    }

    #[test]
    fn test_db_conversion() {
        assert_eq!(linear_to_db(1.0), 0.0);
        assert!((linear_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert_eq!(linear_to_db(0.0), -96.0);
        assert_eq!(linear_to_db(-0.3), -96.0);
        assert_eq!(linear_to_db(1e-9), -96.0);
    }

    #[test]
    fn test_silence_reads_zero() {
        let mut meter = LevelMeter::new(&VisualizerConfig::default());
        meter.process(&[0.0; 512]);
        let data = meter.level_data();
        assert_eq!(data.left_peak, 0.0);
        assert_eq!(data.right_rms, 0.0);
        assert_eq!(data.left_peak_db, DB_FLOOR);
        assert!(!data.clipping);
    }

    #[test]
    fn test_full_scale_sine_clips() {
        let mut meter = LevelMeter::new(&VisualizerConfig::default());
        meter.process(&sine_block(1.0, 480));
        let data = meter.level_data();
        assert!(data.clipping);
        assert!(data.mono_peak >= 0.999);
    }

    #[test]
    fn test_peak_decays_but_not_below_block_peak() {
        let mut meter = LevelMeter::new(&VisualizerConfig::default());
        meter.process(&[0.8, 0.8]);
        meter.process(&[0.1, 0.1]);
        let data = meter.level_data();
        assert!((data.left_peak - 0.8 * 0.95).abs() < 1e-6);

        meter.process(&[0.9, 0.9]);
        assert!((meter.level_data().left_peak - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_rms_smoothing() {
        let config = VisualizerConfig {
            rms_smoothing: 0.5,
            ..Default::default()
        };
        let mut meter = LevelMeter::new(&config);
        meter.process(&[0.4, 0.4, 0.4, 0.4]);
        assert!((meter.level_data().left_rms - 0.2).abs() < 1e-6);

        let config = VisualizerConfig {
            rms_smoothing: 0.0,
            ..Default::default()
        };
        let mut meter = LevelMeter::new(&config);
        meter.process(&[0.4, 0.4, 0.4, 0.4]);
        assert!((meter.level_data().left_rms - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_peak_hold_outlasts_peak() {
        let config = VisualizerConfig {
            peak_hold_ms: 1000,
            sample_rate: 1000,
            ..Default::default()
        };
        let mut meter = LevelMeter::new(&config);
        meter.process(&[0.9, 0.5]);
        for _ in 0..10 {
            meter.process(&[0.0; 20]);
        }
        let data = meter.level_data();
        assert!(data.left_peak < 0.9);
        assert_eq!(data.peak_hold_left, 0.9);
        assert_eq!(data.peak_hold_right, 0.5);
    }

    #[test]
    fn test_mono_values() {
        let config = VisualizerConfig {
            rms_smoothing: 0.0,
            ..Default::default()
        };
        let mut meter = LevelMeter::new(&config);
        meter.process(&[0.2, 0.6]);
        let data = meter.level_data();
        assert!((data.mono_peak - 0.6).abs() < 1e-6);
        assert!((data.mono_rms - 0.4).abs() < 1e-6);
    }
}
