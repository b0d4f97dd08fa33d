//! Error types for the relay core.
//!
//! Every variant here is recoverable. Claim failures are reported to the
//! client; everything else is dropped by the driver without closing the
//! connection.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Errors from [`crate::IdentityRegistry`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The name is held by another live connection
    #[error("name already taken: {0}")]
    NameTaken(String),

    /// Empty names cannot be claimed
    #[error("name must not be empty")]
    EmptyName,
}

/// Errors from [`crate::InactivityMonitor`] construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    /// A zero timeout would expire every identity immediately
    #[error("inactivity timeout must be greater than zero, got {0:?}")]
    ZeroTimeout(Duration),
}

/// Errors from [`crate::Session`] transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Candidate name is empty
    #[error("name must not be empty")]
    EmptyName,

    /// Candidate name exceeds the protocol limit
    #[error("name too long: {len} bytes (max {max})")]
    NameTooLong {
        /// Length of the candidate
        len: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Session already holds an identity
    #[error("session already named {0}")]
    AlreadyNamed(String),

    /// Operation is not valid in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },
}

impl SessionError {
    /// Whether the client should be told its claim was refused.
    ///
    /// Malformed names are dropped silently; a second claim from a named
    /// session is answered.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Self::AlreadyNamed(_))
    }
}
