//! Core error types
//!
//! Every error here indicates caller error or a failed setup step. None of
//! them are retried internally; they propagate to the caller immediately.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the engine, mixer, ducking and visualizer APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Operation invoked outside its valid lifecycle state
    #[error("Illegal state: cannot {operation} while {state}")]
    IllegalState {
        operation: &'static str,
        state: String,
    },

    /// Missing or malformed argument (empty source id, bad config value)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Numeric argument outside its inclusive bounds
    #[error("{what} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Operation on a disposed component
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// Source capability not implemented by the wrapped source
    #[error("Source '{source_id}' does not support {capability}")]
    NotSupported {
        source_id: String,
        capability: &'static str,
    },

    /// Blocking setup step did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Background worker could not be started
    #[error("Failed to spawn {name} thread: {reason}")]
    Spawn { name: &'static str, reason: String },

    /// Device manager or output device failure
    #[error("Device error: {0}")]
    Device(String),
}

impl CoreError {
    /// Shorthand for an illegal-state error
    pub fn illegal_state(operation: &'static str, state: impl std::fmt::Display) -> Self {
        Self::IllegalState {
            operation,
            state: state.to_string(),
        }
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CoreError::illegal_state("start", "Uninitialized");
        assert_eq!(err.to_string(), "Illegal state: cannot start while Uninitialized");

        let err = CoreError::OutOfRange {
            what: "priority",
            value: 11,
            min: 1,
            max: 10,
        };
        assert_eq!(err.to_string(), "priority out of range: 11 (expected 1..=10)");
    }
}
