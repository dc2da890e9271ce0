//! Engine lifecycle state machine
//!
//! ```text
//! Uninitialized ─initialize─► Initializing ─► Ready ◄─stop── Running
//!                                  │            │ └──start──────►│
//!                                  ▼            ▼                ▼
//!                                Error ──────► Disposed ◄────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle state of the audio engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Running = 3,
    Stopping = 4,
    Error = 5,
    Disposed = 6,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Initializing,
            2 => EngineState::Ready,
            3 => EngineState::Running,
            4 => EngineState::Stopping,
            5 => EngineState::Error,
            6 => EngineState::Disposed,
            _ => EngineState::Uninitialized,
        }
    }

    /// Whether the output tap exists in this state
    pub fn has_output(&self) -> bool {
        matches!(self, EngineState::Ready | EngineState::Running)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lock-free mirror of the engine state for the real-time path and queries
///
/// Written only by the engine while it holds its lifecycle gate.
#[derive(Debug)]
pub struct AtomicEngineState {
    state: AtomicU8,
}

impl AtomicEngineState {
    pub fn new(state: EngineState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Check if running (lock-free)
    #[inline]
    pub fn is_running(&self) -> bool {
        self.get() == EngineState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_state_roundtrip() {
        let state = AtomicEngineState::new(EngineState::Uninitialized);
        for s in [
            EngineState::Initializing,
            EngineState::Ready,
            EngineState::Running,
            EngineState::Stopping,
            EngineState::Error,
            EngineState::Disposed,
        ] {
            state.set(s);
            assert_eq!(state.get(), s);
        }
    }

    #[test]
    fn test_only_ready_and_running_have_output() {
        assert!(EngineState::Ready.has_output());
        assert!(EngineState::Running.has_output());
        assert!(!EngineState::Uninitialized.has_output());
        assert!(!EngineState::Disposed.has_output());
    }
}
