//! Custom error types for the driver.
//!
//! This module defines the primary error type, `DriveError`. Only conditions that make
//! continued operation meaningless are represented here:
//!
//! - **`Config`**: Wraps errors from `figment`, typically file parsing or type mismatches
//!   in the TOML/environment sources.
//! - **`Configuration`**: Semantic errors in a configuration that parsed fine but holds
//!   values the rig cannot use (zero baud rate, negative timeouts).
//! - **`ConnectionFailed`**: The serial port could not be opened after every retry.
//! - **`MissingObservationSpace` / `MissingActionSpace` / `InvalidActionSpace`**: a
//!   session was built without usable space descriptors.
//! - **`InvalidInitPosition` / `InitPositionArity`**: the `init_position` override is
//!   not a sequence of integers, or its length does not match the action space.
//!
//! Transport hiccups (a disconnected cable, garbage bytes, a missing acknowledgement) are
//! *not* errors. The link and session layers log them and hand back a
//! failure sentinel so the control loop keeps running.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type AppResult<T> = std::result::Result<T, DriveError>;

/// Hard failures surfaced by the driver.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Failed to connect to {port} after {attempts} attempts.")]
    ConnectionFailed { port: String, attempts: u32 },

    #[error("Observation space must be provided.")]
    MissingObservationSpace,

    #[error("Action space must be provided.")]
    MissingActionSpace,

    #[error("Action space must be properly initialized with a valid shape.")]
    InvalidActionSpace,

    #[error("Invalid type for 'init_position': {0}. Expected list, or tuple.")]
    InvalidInitPosition(String),

    #[error("'init_position' has {actual} values but the action space expects {expected}")]
    InitPositionArity { expected: usize, actual: usize },

    #[error("Session is closed")]
    SessionClosed,
}

impl From<figment::Error> for DriveError {
    fn from(value: figment::Error) -> Self {
        DriveError::Config(Box::new(value))
    }
}

impl DriveError {
    /// Whether retrying the failed operation later could succeed.
    ///
    /// Connection exhaustion is recoverable from the operator's point of view (plug the
    /// rig back in); everything rooted in configuration or construction is not.
    pub fn can_recover(&self) -> bool {
        match self {
            DriveError::ConnectionFailed { .. } => true,
            DriveError::Config(_)
            | DriveError::Configuration(_)
            | DriveError::MissingObservationSpace
            | DriveError::MissingActionSpace
            | DriveError::InvalidActionSpace
            | DriveError::InvalidInitPosition(_)
            | DriveError::InitPositionArity { .. }
            | DriveError::SessionClosed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failure_names_port_and_attempts() {
        let err = DriveError::ConnectionFailed {
            port: "/dev/ttyACM3".into(),
            attempts: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyACM3"));
        assert!(msg.contains("3 attempts"));
        assert!(err.can_recover());
    }

    #[test]
    fn construction_errors_are_not_recoverable() {
        assert!(!DriveError::MissingActionSpace.can_recover());
        assert!(!DriveError::InvalidInitPosition("string".into()).can_recover());
        assert!(!DriveError::InitPositionArity {
            expected: 3,
            actual: 2
        }
        .can_recover());
    }

    #[test]
    fn figment_errors_convert() {
        let err: DriveError = figment::Error::from("bad value".to_string()).into();
        match err {
            DriveError::Config(inner) => assert!(inner.to_string().contains("bad value")),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
