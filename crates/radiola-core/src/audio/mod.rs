//! Audio I/O plumbing around the engine
//!
//! - **Config**: stream format, block size, tap depth, setup timeout
//! - **Tap**: bounded 16-bit PCM output consumed by local playback and
//!   streaming outputs
//! - **Device**: boundary to the external device manager
//! - **CPAL backend**: optional local playback driving the block processor
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   lifecycle / setters   ┌─────────────────────┐
//! │  Control plane   │────────────────────────►│ AudioEngine / Mixer │
//! │ (UI, automation) │◄──── EventBus ──────────│ DuckingService      │
//! └──────────────────┘                         └──────────┬──────────┘
//!                                                         │ atomics + try_lock
//!                                              ┌──────────▼──────────┐
//!                                              │   BlockProcessor    │
//!                                              │ (real-time callback)│
//!                                              └──┬───────────────┬──┘
//!                                                 │               │
//!                                      ┌──────────▼───┐   ┌───────▼──────────┐
//!                                      │  Output tap  │   │ VisualizerService│
//!                                      │ (rtrb, PCM16)│   │  (ring buffers)  │
//!                                      └──────────────┘   └──────────────────┘
//! ```

mod config;
mod device;
mod error;
mod tap;

#[cfg(feature = "cpal-output")]
mod cpal_backend;

pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, TAP_BYTES_PER_SAMPLE};
pub use device::{DeviceEvent, DeviceId, DeviceManager, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use tap::{decode_pcm16le, encode_sample, OutputTap, TapReader};

#[cfg(feature = "cpal-output")]
pub use cpal_backend::{start_output, CpalOutputHandle};
