//! Visualization pipeline
//!
//! Turns the mixed stereo stream into three pull-based snapshots:
//! - [`LevelData`]: peak / RMS / hold per channel, clipping
//! - [`SpectrumData`]: windowed FFT magnitudes
//! - [`WaveformData`]: the most recent stereo pairs
//!
//! Snapshots are plain values recomputed on every pull. The only state kept
//! between pulls is meter smoothing, spectrum smoothing and the ring buffers.

mod level;
mod service;
mod spectrum;
mod waveform;

pub use level::{linear_to_db, LevelData, LevelMeter, CLIP_THRESHOLD, DB_FLOOR};
pub use service::VisualizerService;
pub use spectrum::{MonoHistory, SpectrumAnalyzer, SpectrumData};
pub use waveform::{WaveformAnalyzer, WaveformData};
