//! Common types for Radiola
//!
//! Fundamental sample types shared by the engine, the mixer and the
//! visualization pipeline.

use std::sync::atomic::{AtomicU32, Ordering};

/// Default sample rate of the console output (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default channel count of the mixed stream
pub const DEFAULT_CHANNELS: u16 = 2;

/// Maximum block size pre-allocated for the real-time path (frames)
///
/// Covers every buffer size the output backends negotiate (64..4096).
pub const MAX_BLOCK_FRAMES: usize = 8192;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` so that `&[StereoSample]` and interleaved `&[f32]`
/// can be converted into each other without copying via bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

/// View an interleaved stereo slice as stereo frames
///
/// A trailing unpaired sample is ignored rather than rejected.
#[inline]
pub fn as_stereo_frames(interleaved: &[Sample]) -> &[StereoSample] {
    let even = interleaved.len() & !1;
    bytemuck::cast_slice(&interleaved[..even])
}

/// Lock-free f32 parameter shared between control and audio threads
///
/// Stores the f32 bit pattern in an `AtomicU32`. All accesses are
/// `Relaxed`: readers only need visibility, not ordering with other memory.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_peak() {
        let s = StereoSample::new(-0.8, 0.3);
        assert_eq!(s.peak(), 0.8);
    }

    #[test]
    fn test_stereo_frames_drop_trailing_sample() {
        let data = [0.1, 0.2, 0.3, 0.4, 0.5];
        let frames = as_stereo_frames(&data);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], StereoSample::new(0.3, 0.4));
    }

    #[test]
    fn test_atomic_f32_roundtrip() {
        let value = AtomicF32::new(0.75);
        assert_eq!(value.get(), 0.75);
        value.set(-0.25);
        assert_eq!(value.get(), -0.25);
    }
}
