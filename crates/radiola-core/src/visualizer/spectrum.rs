//! Spectrum analyzer - windowed real FFT over the most recent samples
//!
//! Split in two halves so the real-time feed never waits on an FFT:
//! - [`MonoHistory`]: cheap ring of the latest mono-folded samples, written
//!   from the audio callback
//! - [`SpectrumAnalyzer`]: FFT plan, window and smoothing state, run on pull

use std::sync::Arc;

use chrono::{DateTime, Utc};
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;

use crate::config::VisualizerConfig;
use crate::error::{CoreError, CoreResult};
use crate::types::as_stereo_frames;

/// Spectrum snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumData {
    /// Linear magnitude per bin, `fft_size / 2` entries (full-scale sine ≈ 1.0)
    pub magnitudes: Vec<f32>,
    /// Center frequency of each bin in Hz (`i * sample_rate / fft_size`)
    pub frequencies: Vec<f32>,
    /// Bin spacing in Hz
    pub frequency_resolution: f32,
    pub fft_size: usize,
    pub sample_rate: u32,
    pub timestamp: DateTime<Utc>,
}

impl SpectrumData {
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Frequency of the strongest bin (None when silent)
    pub fn peak_frequency(&self) -> Option<f32> {
        self.magnitudes
            .iter()
            .enumerate()
            .filter(|(_, m)| **m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| self.frequencies[i])
    }
}

/// Ring of the most recent mono samples (left/right averaged)
#[derive(Debug, Clone)]
pub struct MonoHistory {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl MonoHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    /// Append an interleaved stereo block (a trailing unpaired sample is ignored)
    pub fn push_stereo(&mut self, samples: &[f32]) {
        let len = self.buffer.len();
        for frame in as_stereo_frames(samples) {
            self.buffer[self.write_pos] = (frame.left + frame.right) * 0.5;
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    /// Copy the history oldest-first into `out` (must match the capacity)
    pub fn copy_chronological(&self, out: &mut [f32]) {
        let (newer, older) = self.buffer.split_at(self.write_pos);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..older.len() + newer.len()].copy_from_slice(newer);
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Windowed FFT with smoothing across successive analyses
pub struct SpectrumAnalyzer {
    fft_size: usize,
    sample_rate: u32,
    smoothing: f32,
    fft: Arc<dyn RealToComplex<f32>>,
    /// Hann window (None = rectangular)
    window: Option<Vec<f32>>,
    /// Amplitude normalization: 2 / sum(window)
    scale: f32,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    frequencies: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(config: &VisualizerConfig) -> CoreResult<Self> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || fft_size < 2 {
            return Err(CoreError::InvalidArgument(format!(
                "FFT size must be a power of two, got {}",
                fft_size
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window: Option<Vec<f32>> = config.window_enabled.then(|| {
            (0..fft_size)
                .map(|i| {
                    let phase = 2.0 * std::f32::consts::PI * i as f32 / fft_size as f32;
                    0.5 * (1.0 - phase.cos())
                })
                .collect()
        });
        let window_sum = window
            .as_ref()
            .map(|w| w.iter().sum::<f32>())
            .unwrap_or(fft_size as f32);

        let bins = fft_size / 2;
        let resolution = config.sample_rate as f32 / fft_size as f32;

        Ok(Self {
            fft_size,
            sample_rate: config.sample_rate,
            smoothing: config.spectrum_smoothing,
            input: fft.make_input_vec(),
            output: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            window,
            scale: 2.0 / window_sum,
            magnitudes: vec![0.0; bins],
            frequencies: (0..bins).map(|i| i as f32 * resolution).collect(),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Fold `frame` (oldest-first, zero-padded or truncated to `fft_size`)
    /// into the smoothed spectrum and return the result
    pub fn analyze(&mut self, frame: &[f32]) -> CoreResult<SpectrumData> {
        let n = frame.len().min(self.fft_size);
        self.input[..n].copy_from_slice(&frame[..n]);
        self.input[n..].fill(0.0);
        if let Some(window) = &self.window {
            for (s, w) in self.input.iter_mut().zip(window) {
                *s *= w;
            }
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| CoreError::InvalidArgument(format!("FFT failed: {:?}", e)))?;

        let alpha = self.smoothing;
        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.output) {
            let current = bin.norm() * self.scale;
            *mag = alpha * *mag + (1.0 - alpha) * current;
        }

        Ok(self.snapshot())
    }

    /// Current smoothed spectrum without folding in new audio
    pub fn snapshot(&self) -> SpectrumData {
        SpectrumData {
            magnitudes: self.magnitudes.clone(),
            frequencies: self.frequencies.clone(),
            frequency_resolution: self.sample_rate as f32 / self.fft_size as f32,
            fft_size: self.fft_size,
            sample_rate: self.sample_rate,
            timestamp: Utc::now(),
        }
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.magnitudes.fill(0.0);
    }
}
