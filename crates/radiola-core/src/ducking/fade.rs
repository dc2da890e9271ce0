//! Fade curves for the duck level
//!
//! | Policy     | Curve                 | Step spacing | Min steps |
//! |------------|-----------------------|--------------|-----------|
//! | Instant    | jump                  | -            | 1         |
//! | FadeQuick  | linear                | 25 ms        | 2         |
//! | FadeSmooth | smoothstep 3t² - 2t³  | 10 ms        | 6         |
//!
//! For the same duration FadeSmooth always takes more steps than FadeQuick.
//! The last step lands exactly on the target.

use std::time::Duration;

use crate::config::DuckPolicy;

const QUICK_STEP_MS: u64 = 25;
const QUICK_MIN_STEPS: u32 = 2;
const SMOOTH_STEP_MS: u64 = 10;
const SMOOTH_MIN_STEPS: u32 = 6;

/// A precomputed ramp from one duck level to another
#[derive(Debug, Clone, PartialEq)]
pub struct FadePlan {
    policy: DuckPolicy,
    from: f32,
    to: f32,
    steps: u32,
    step_interval: Duration,
}

impl FadePlan {
    pub fn new(policy: DuckPolicy, from: f32, to: f32, duration: Duration) -> Self {
        let (step_ms, min_steps) = match policy {
            DuckPolicy::Instant => {
                return Self {
                    policy,
                    from,
                    to,
                    steps: 1,
                    step_interval: Duration::ZERO,
                }
            }
            DuckPolicy::FadeQuick => (QUICK_STEP_MS, QUICK_MIN_STEPS),
            DuckPolicy::FadeSmooth => (SMOOTH_STEP_MS, SMOOTH_MIN_STEPS),
        };

        let duration_ms = duration.as_millis() as u64;
        let steps = (duration_ms.div_ceil(step_ms) as u32).max(min_steps);
        Self {
            policy,
            from,
            to,
            steps,
            step_interval: duration / steps,
        }
    }

    /// Number of level updates this ramp emits
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Wall-clock spacing between updates (zero = emit all at once)
    pub fn step_interval(&self) -> Duration {
        self.step_interval
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    /// Level after `step` updates (1-based, clamped to the last step)
    pub fn level_at(&self, step: u32) -> f32 {
        let step = step.min(self.steps);
        if step == self.steps {
            return self.to;
        }
        let t = step as f32 / self.steps as f32;
        let shaped = match self.policy {
            DuckPolicy::FadeSmooth => t * t * (3.0 - 2.0 * t),
            _ => t,
        };
        self.from + (self.to - self.from) * shaped
    }

    pub fn is_last(&self, step: u32) -> bool {
        step >= self.steps
    }
}
