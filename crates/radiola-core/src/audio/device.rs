//! Device manager boundary
//!
//! Enumeration, hot-plug and USB exclusivity live in the external device
//! manager. The engine only asks it for the active output device during
//! `initialize()` and re-emits its change notifications unchanged.

use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, PipeWire, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier (e.g., "Alsa", "CoreAudio")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Get a display label that includes the host if available
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Output device as supplied by the device manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDevice {
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// Output channels
    pub channels: u16,
    /// Native sample rate
    pub sample_rate: u32,
}

/// Device change notification, forwarded verbatim by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Added(OutputDevice),
    Removed(OutputDevice),
    DefaultChanged(OutputDevice),
}

/// External device manager contract
pub trait DeviceManager: Send + Sync {
    /// Resolve the device the console should play through
    ///
    /// May block (e.g. waiting for a USB interface to settle); the engine
    /// bounds it with the configured init timeout.
    fn active_output_device(&self) -> CoreResult<Option<OutputDevice>>;

    /// Subscribe to device change notifications
    fn subscribe(&self) -> Receiver<DeviceEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_label() {
        assert_eq!(DeviceId::new("hw:0,0").display_label(), "hw:0,0");
        assert_eq!(
            DeviceId::with_host("hw:0,0", "ALSA").display_label(),
            "[ALSA] hw:0,0"
        );
    }
}
