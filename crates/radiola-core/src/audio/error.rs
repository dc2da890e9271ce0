//! Output backend error types

use thiserror::Error;

/// Errors that can occur while driving a local output device
#[derive(Error, Debug)]
pub enum AudioError {
    /// Failed to get default device
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Device format differs from the engine's stream format
    #[error("Format mismatch: engine {engine_rate}Hz/{engine_channels}ch, device {device_rate}Hz/{device_channels}ch")]
    FormatMismatch {
        engine_rate: u32,
        engine_channels: u16,
        device_rate: u32,
        device_channels: u16,
    },
}

/// Result type for output backend operations
pub type AudioResult<T> = Result<T, AudioError>;
