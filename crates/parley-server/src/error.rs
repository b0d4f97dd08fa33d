//! Server error types.

use std::fmt;

use parley_proto::ProtocolError;

use crate::driver_error::DriverError;

/// Errors that can occur in the server runtime.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, missing TLS certs, zero
    /// idle timeout).
    ///
    /// Fatal - prevents server startup. Fix configuration and restart.
    Config(String),

    /// Transport/network error (endpoint failure, stream I/O).
    ///
    /// Per-connection transport errors end that connection only.
    Transport(String),

    /// Protocol error (malformed frame on the wire).
    ///
    /// Fatal for that connection, the relay keeps serving everyone else.
    Protocol(ProtocolError),

    /// Driver error (from `ServerDriver` processing).
    Driver(DriverError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
            Self::Driver(err) => write!(f, "driver error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for ServerError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Config(msg) => Self::Config(msg),
            other => Self::Driver(other),
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_config_errors_surface_as_config() {
        let err: ServerError = DriverError::Config("idle timeout is zero".to_string()).into();
        assert!(matches!(err, ServerError::Config(_)));
        assert_eq!(err.to_string(), "configuration error: idle timeout is zero");
    }

    #[test]
    fn other_driver_errors_keep_their_source() {
        let err: ServerError = DriverError::SessionNotFound(3).into();
        assert_eq!(err.to_string(), "driver error: session not found: 3");
        assert!(std::error::Error::source(&err).is_some());
    }
}
