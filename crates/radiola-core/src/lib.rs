//! Radiola Core - Real-time audio core for the multi-source playback console
//!
//! Combines every active audio producer (tuner, turntable, streaming, local
//! files, notification/TTS clips) into one output stream, ducks background
//! audio while event audio plays, and derives level/spectrum/waveform
//! telemetry from the same blocks.

pub mod audio;
pub mod config;
pub mod ducking;
pub mod engine;
pub mod error;
pub mod events;
pub mod source;
pub mod types;
pub mod visualizer;

pub use error::{CoreError, CoreResult};
pub use types::*;
