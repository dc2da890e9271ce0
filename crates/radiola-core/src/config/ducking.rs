//! Ducking configuration
//!
//! Controls how far background audio is attenuated while event audio
//! plays, and how the level moves between the two targets.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// How the duck level travels between unattenuated and ducked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuckPolicy {
    /// Jump straight to the target
    Instant,
    /// Short linear ramp, coarse steps
    FadeQuick,
    /// Smoothstep ramp, fine steps
    #[default]
    FadeSmooth,
}

/// Ducking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuckingConfig {
    /// Level held while any event is active, in percent of full volume
    /// (0 = silent, 100 = no attenuation).
    /// Default: 20
    pub duck_percentage: u8,

    /// Fade policy for both directions.
    /// Default: FadeSmooth
    pub policy: DuckPolicy,

    /// Ramp duration when ducking, in milliseconds.
    /// Default: 150
    pub attack_ms: u32,

    /// Ramp duration when restoring, in milliseconds.
    /// Default: 600
    pub release_ms: u32,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            duck_percentage: 20,
            policy: DuckPolicy::default(),
            attack_ms: 150,
            release_ms: 600,
        }
    }
}

impl DuckingConfig {
    /// Reject a duck percentage above 100
    pub fn validate(&self) -> CoreResult<()> {
        if self.duck_percentage > 100 {
            return Err(CoreError::OutOfRange {
                what: "duck percentage",
                value: self.duck_percentage as i64,
                min: 0,
                max: 100,
            });
        }
        Ok(())
    }

    /// Set the ducked level
    pub fn with_percentage(mut self, percentage: u8) -> Self {
        self.duck_percentage = percentage;
        self
    }

    /// Set the fade policy
    pub fn with_policy(mut self, policy: DuckPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set attack and release durations
    pub fn with_times(mut self, attack_ms: u32, release_ms: u32) -> Self {
        self.attack_ms = attack_ms;
        self.release_ms = release_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DuckingConfig::default();
        assert_eq!(config.duck_percentage, 20);
        assert_eq!(config.policy, DuckPolicy::FadeSmooth);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_percentage_above_hundred_rejected() {
        let config = DuckingConfig::default().with_percentage(101);
        assert!(matches!(
            config.validate(),
            Err(CoreError::OutOfRange { value: 101, .. })
        ));
    }
}
