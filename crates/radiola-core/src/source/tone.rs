//! Sine tone source - test signal and line-check generator

use std::f64::consts::TAU;
use std::sync::Mutex;

use super::{AudioSource, SourceCategory, SourceId};
use crate::error::CoreResult;
use crate::types::AtomicF32;

/// Continuous sine generator, same signal on every channel
pub struct ToneSource {
    id: SourceId,
    category: SourceCategory,
    volume: AtomicF32,
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    channels: usize,
    phase: Mutex<f64>,
}

impl ToneSource {
    pub fn new(
        id: &str,
        category: SourceCategory,
        frequency: f64,
        sample_rate: u32,
        channels: u16,
    ) -> CoreResult<Self> {
        Ok(Self {
            id: SourceId::new(id)?,
            category,
            volume: AtomicF32::new(1.0),
            frequency,
            amplitude: 1.0,
            sample_rate: sample_rate.max(1),
            channels: channels.max(1) as usize,
            phase: Mutex::new(0.0),
        })
    }

    /// Set the peak amplitude of the generated sine
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }
}

impl AudioSource for ToneSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn category(&self) -> SourceCategory {
        self.category
    }

    fn volume(&self) -> f32 {
        self.volume.get()
    }

    fn set_volume(&self, volume: f32) {
        self.volume.set(volume.clamp(0.0, 1.0));
    }

    fn read_samples(&self, out: &mut [f32]) -> usize {
        let mut phase = self.phase.lock().unwrap_or_else(|p| p.into_inner());
        let increment = TAU * self.frequency / self.sample_rate as f64;
        let frames = out.len() / self.channels;

        for frame in out.chunks_exact_mut(self.channels) {
            let value = (phase.sin() as f32) * self.amplitude;
            frame.fill(value);
            *phase = (*phase + increment) % TAU;
        }
        frames * self.channels
    }
}
