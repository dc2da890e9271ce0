//! Waveform analyzer - fixed-capacity ring of the latest stereo pairs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::VisualizerConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::as_stereo_frames;

/// Waveform snapshot, oldest sample first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformData {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
    /// Time span covered by the buffer (`capacity / sample_rate`)
    pub duration_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl WaveformData {
    pub fn sample_count(&self) -> usize {
        self.left.len()
    }
}

/// Circular buffer of the most recent `capacity` stereo pairs
///
/// Slots never written read as silence, so snapshots always have
/// exactly `capacity` points.
#[derive(Debug, Clone)]
pub struct WaveformAnalyzer {
    left: Vec<f32>,
    right: Vec<f32>,
    write_pos: usize,
    sample_rate: u32,
}

impl WaveformAnalyzer {
    pub fn new(config: &VisualizerConfig) -> Self {
        Self::with_capacity(config.waveform_samples, config.sample_rate)
    }

    pub fn with_capacity(capacity: usize, sample_rate: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
            write_pos: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.left.len()
    }

    /// `capacity / sample_rate` in seconds
    pub fn duration_secs(&self) -> f64 {
        self.capacity() as f64 / self.sample_rate as f64
    }

    /// Append an interleaved stereo block of any length
    ///
    /// A trailing unpaired sample is dropped; the oldest pairs are
    /// overwritten once the buffer is full.
    pub fn add_samples(&mut self, samples: &[f32]) {
        let capacity = self.capacity();
        let frames = as_stereo_frames(samples);
        // Only the newest `capacity` pairs can survive
        let skip = frames.len().saturating_sub(capacity);
        for frame in &frames[skip..] {
            self.left[self.write_pos] = frame.left;
            self.right[self.write_pos] = frame.right;
            self.write_pos = (self.write_pos + 1) % capacity;
        }
    }

    /// Full buffer, oldest first
    pub fn waveform_data(&self) -> WaveformData {
        WaveformData {
            left: chronological(&self.left, self.write_pos),
            right: chronological(&self.right, self.write_pos),
            sample_rate: self.sample_rate,
            duration_secs: self.duration_secs(),
            timestamp: Utc::now(),
        }
    }

    /// Reduce the buffer to exactly `target` points, keeping peaks
    ///
    /// Each output point is the sample with the largest magnitude in its
    /// bucket (sign preserved). A target at or above the capacity returns
    /// the buffer unchanged.
    pub fn downsampled(&self, target: usize) -> CoreResult<WaveformData> {
        if target == 0 {
            return Err(CoreError::OutOfRange {
                what: "downsample target",
                value: 0,
                min: 1,
                max: i64::MAX,
            });
        }
        let mut data = self.waveform_data();
        if target >= self.capacity() {
            return Ok(data);
        }
        data.left = peak_reduce(&data.left, target);
        data.right = peak_reduce(&data.right, target);
        Ok(data)
    }

    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write_pos = 0;
    }
}

fn chronological(ring: &[f32], write_pos: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(ring.len());
    out.extend_from_slice(&ring[write_pos..]);
    out.extend_from_slice(&ring[..write_pos]);
    out
}

fn peak_reduce(samples: &[f32], target: usize) -> Vec<f32> {
    let len = samples.len();
    (0..target)
        .map(|i| {
            let start = i * len / target;
            let end = ((i + 1) * len / target).max(start + 1);
            samples[start..end]
                .iter()
                .copied()
                .fold(0.0f32, |acc, s| if s.abs() > acc.abs() { s } else { acc })
        })
        .collect()
}
