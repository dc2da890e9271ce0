//! CPAL output backend - local playback of the mixed stream
//!
//! ```text
//! ┌──────────────────┐  owns   ┌─────────────────────┐  copy   ┌──────────────┐
//! │ CPAL audio thread│────────►│   BlockProcessor    │────────►│ device buffer│
//! │ (output callback)│         │ (engine channels)   │         │ (dev layout) │
//! └──────────────────┘         └─────────────────────┘         └──────────────┘
//! ```
//!
//! The processor is moved into the callback, so the stream needs no lock.
//! Devices with more channels than the engine get silence on the extras.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use crate::engine::BlockProcessor;
use crate::types::MAX_BLOCK_FRAMES;

/// Smallest callback size requested from the device
const MIN_BUFFER_FRAMES: u32 = 64;

/// Keeps the output stream alive. Drop this to stop playback.
pub struct CpalOutputHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    /// Buffer size in frames as requested from the device
    buffer_size: u32,
}

impl CpalOutputHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Audio latency in milliseconds (one-way, output only)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the default output device and drive `processor` from its callback
pub fn start_output(processor: BlockProcessor, config: &AudioConfig) -> AudioResult<CpalOutputHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoDefaultDevice)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Output config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0
    );

    let stream = build_output_stream(&device, &stream_config, processor)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Output stream started");

    Ok(CpalOutputHandle {
        _stream: stream,
        device_name,
        sample_rate,
        buffer_size,
    })
}

/// Pick an f32 config at the engine's rate with at least the engine's channels
///
/// Returns (SupportedStreamConfig, buffer_size_in_frames). The engine does
/// not resample, so a device that cannot run at the configured rate is
/// rejected.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let rate = config.sample_rate;
    let supports_rate = move |c: &&cpal::SupportedStreamConfigRange| {
        rate >= c.min_sample_rate().0 && rate <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(supports_rate)
        // Exact channel match first, then anything wide enough
        .find(|c| c.channels() == config.channels)
        .or_else(|| {
            supported_configs
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .filter(supports_rate)
                .find(|c| c.channels() >= config.channels)
        });

    let Some(best) = best else {
        let fallback = &supported_configs[0];
        return Err(AudioError::FormatMismatch {
            engine_rate: rate,
            engine_channels: config.channels,
            device_rate: fallback.max_sample_rate().0,
            device_channels: fallback.channels(),
        });
    };

    let buffer_size = config
        .buffer_size
        .as_frames()
        .clamp(MIN_BUFFER_FRAMES, MAX_BLOCK_FRAMES as u32);
    log::debug!(
        "Selected buffer size: {} frames for {:?}",
        buffer_size,
        config.buffer_size
    );

    Ok((best.clone().with_sample_rate(cpal::SampleRate(rate)), buffer_size))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut processor: BlockProcessor,
) -> AudioResult<Stream> {
    let device_channels = config.channels as usize;
    let engine_channels = processor.channels();
    // Pre-allocated render buffer in engine layout
    let mut block = vec![0.0f32; MAX_BLOCK_FRAMES * engine_channels];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                if device_channels == engine_channels {
                    processor.process(data);
                    return;
                }

                for chunk in data.chunks_mut(MAX_BLOCK_FRAMES * device_channels) {
                    let frames = chunk.len() / device_channels;
                    let rendered = &mut block[..frames * engine_channels];
                    processor.process(rendered);

                    for (out, frame) in chunk
                        .chunks_mut(device_channels)
                        .zip(rendered.chunks_exact(engine_channels))
                    {
                        out[..engine_channels].copy_from_slice(frame);
                        // Fill additional channels with silence
                        for ch in out.iter_mut().skip(engine_channels) {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
