//! Audio engine - lifecycle, master mixer, block processor
//!
//! This module contains the mixing core of the console:
//! - AudioEngine: lifecycle state machine, output tap, device wiring
//! - MasterMixer: source registry plus volume/balance/mute
//! - BlockProcessor: the real-time renderer driven by the audio callback

mod engine;
mod mixer;
mod processor;
mod state;

pub use engine::*;
pub use mixer::*;
pub use processor::{AttenuationSource, BlockProcessor, EngineStats};
pub use state::*;
