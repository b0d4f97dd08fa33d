//! Driver error types.
//!
//! Errors the [`crate::ServerDriver`] returns from `process_event`. None of
//! them affect other connections; the runtime logs them and carries on.

use std::fmt;

use parley_core::SessionError;
use parley_proto::ProtocolError;

/// Errors that can occur while the driver processes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not known to the driver.
    ///
    /// Occurs when a frame arrives for a connection the driver already
    /// terminated (for example an idle timeout racing an in-flight frame).
    /// Transient - the runtime is about to close that connection.
    SessionNotFound(u64),

    /// Session ID already registered.
    ///
    /// The runtime handed out a duplicate connection ID. This is a logic bug.
    SessionAlreadyExists(u64),

    /// Session state machine rejected a transition.
    Session(SessionError),

    /// Frame encoding error while building a reply or broadcast.
    Protocol(String),

    /// Invalid driver configuration (zero idle timeout, zero connection
    /// limit). Fatal at startup.
    Config(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
            Self::Session(err) => write!(f, "session error: {err}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Config(msg) => write!(f, "invalid driver config: {msg}"),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Session(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SessionError> for DriverError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<ProtocolError> for DriverError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
