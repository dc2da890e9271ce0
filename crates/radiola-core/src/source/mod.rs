//! Audio source contract
//!
//! Radio, vinyl, streaming and TTS sources live outside the core. The mixer
//! and the ducking service only see this capability set: a stable id, a
//! category, a volume and a pull of interleaved float blocks. Anything
//! category-specific (seeking) is an optional capability trait discovered
//! at runtime via `as_seekable()`.

mod clip;
mod tone;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub use clip::ClipSource;
pub use tone::ToneSource;

/// Priority assigned to Primary sources unless overridden
pub const DEFAULT_PRIMARY_PRIORITY: u8 = 5;

/// Priority assigned to Event sources unless overridden
pub const DEFAULT_EVENT_PRIORITY: u8 = 7;

/// Stable source identifier (never empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create an id, rejecting empty or whitespace-only strings
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "source id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceCategory {
    /// Long-running source; only one plays at a time (enforced externally)
    Primary,
    /// Short-lived clip that may overlap others and triggers ducking
    Event,
}

impl SourceCategory {
    /// Ducking priority used until one is set explicitly
    pub fn default_priority(&self) -> u8 {
        match self {
            SourceCategory::Primary => DEFAULT_PRIMARY_PRIORITY,
            SourceCategory::Event => DEFAULT_EVENT_PRIORITY,
        }
    }
}

/// Capability set every audio source provides
///
/// `read_samples` is called from the real-time callback: implementations
/// must not block on I/O and should only touch pre-allocated state.
pub trait AudioSource: Send + Sync {
    /// Stable identifier
    fn id(&self) -> &SourceId;

    /// Primary or Event
    fn category(&self) -> SourceCategory;

    /// Per-source volume in [0, 1]
    fn volume(&self) -> f32;

    /// Set the per-source volume (clamped to [0, 1])
    fn set_volume(&self, volume: f32);

    /// Fill `out` with interleaved samples at the engine's rate and channel
    /// count, returning how many samples were written. The mixer treats the
    /// rest of the block as silence.
    fn read_samples(&self, out: &mut [f32]) -> usize;

    /// Whether the source has nothing more to play
    fn is_finished(&self) -> bool {
        false
    }

    /// Seek capability, if implemented
    fn as_seekable(&self) -> Option<&dyn Seekable> {
        None
    }
}

/// Optional seek capability (local files, clips)
pub trait Seekable {
    /// Jump to a position from the start of the source
    fn seek(&self, position: Duration) -> CoreResult<()>;

    /// Current playback position
    fn position(&self) -> Duration;

    /// Total length, if known
    fn duration(&self) -> Option<Duration>;
}

/// Shared handle to a source
pub type SourceHandle = Arc<dyn AudioSource>;

/// Seek a source, failing with `NotSupported` when it cannot seek
pub fn seek(source: &dyn AudioSource, position: Duration) -> CoreResult<()> {
    match source.as_seekable() {
        Some(seekable) => seekable.seek(position),
        None => Err(CoreError::NotSupported {
            source_id: source.id().to_string(),
            capability: "seek",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_rejected() {
        assert!(matches!(SourceId::new(""), Err(CoreError::InvalidArgument(_))));
        assert!(matches!(SourceId::new("   "), Err(CoreError::InvalidArgument(_))));
        assert_eq!(SourceId::new("fm-tuner").unwrap().as_str(), "fm-tuner");
    }

    #[test]
    fn test_default_priorities() {
        assert_eq!(SourceCategory::Primary.default_priority(), 5);
        assert_eq!(SourceCategory::Event.default_priority(), 7);
    }

    #[test]
    fn test_seek_on_non_seekable_source() {
        let tone = ToneSource::new("fm-tuner", SourceCategory::Primary, 440.0, 48000, 2).unwrap();
        let err = seek(&tone, Duration::from_secs(1)).unwrap_err();
        assert_eq!(
            err,
            CoreError::NotSupported {
                source_id: "fm-tuner".to_string(),
                capability: "seek",
            }
        );
    }
}
