//! Engine startup configuration
//!
//! Fixed parameters read once by `AudioEngine::initialize`: stream format,
//! block size, output tap depth and the setup timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, MAX_BLOCK_FRAMES};

/// Default buffer size when no preference is specified (frames)
/// 512 frames is a safe default on the console's embedded boards
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Bytes per sample on the output tap (16-bit PCM)
pub const TAP_BYTES_PER_SAMPLE: usize = 2;

/// Preferred buffer size for the audio callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Use the console default
    #[default]
    Default,
    /// Request a specific buffer size in frames
    Fixed(u32),
}

impl BufferSize {
    /// Get the buffer size in frames
    pub fn as_frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => *frames,
        }
    }
}

/// Configuration for the audio engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the mixed stream. Default: 48000
    pub sample_rate: u32,
    /// Interleaved channel count. Default: 2
    pub channels: u16,
    /// Block size of the real-time callback
    pub buffer_size: BufferSize,
    /// Depth of the output tap in milliseconds of audio. Default: 500
    pub tap_buffer_ms: u32,
    /// Upper bound for blocking setup steps in `initialize()`. Default: 2000
    pub init_timeout_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_size: BufferSize::default(),
            tap_buffer_ms: 500,
            init_timeout_ms: 2000,
        }
    }
}

impl AudioConfig {
    /// Validate stream format and sizes
    pub fn validate(&self) -> CoreResult<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(CoreError::InvalidArgument(format!(
                "sample rate {} Hz outside 8000..=192000",
                self.sample_rate
            )));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(CoreError::InvalidArgument(format!(
                "channel count {} outside 1..=8",
                self.channels
            )));
        }
        let frames = self.buffer_frames();
        if frames == 0 || frames > MAX_BLOCK_FRAMES {
            return Err(CoreError::InvalidArgument(format!(
                "buffer size {} frames outside 1..={}",
                frames, MAX_BLOCK_FRAMES
            )));
        }
        if self.tap_buffer_ms == 0 {
            return Err(CoreError::InvalidArgument(
                "output tap duration must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Block size in frames
    pub fn buffer_frames(&self) -> usize {
        self.buffer_size.as_frames() as usize
    }

    /// One-way output latency of a single block in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_frames() as f32 / self.sample_rate as f32) * 1000.0
    }

    /// Capacity of the output tap in bytes
    ///
    /// Never smaller than one block, so a single block always fits an empty tap.
    pub fn tap_capacity_bytes(&self) -> usize {
        let frames = (self.sample_rate as u64 * self.tap_buffer_ms as u64 / 1000) as usize;
        let frames = frames.max(self.buffer_frames());
        frames * self.channels as usize * TAP_BYTES_PER_SAMPLE
    }

    /// Timeout applied to blocking setup steps
    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms as u64)
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the channel count
    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Set a fixed buffer size in frames
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    /// Set the output tap depth
    pub fn with_tap_buffer_ms(mut self, ms: u32) -> Self {
        self.tap_buffer_ms = ms;
        self
    }

    /// Set the setup timeout
    pub fn with_init_timeout_ms(mut self, ms: u32) -> Self {
        self.init_timeout_ms = ms;
        self
    }
}
