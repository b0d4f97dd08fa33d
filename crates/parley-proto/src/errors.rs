//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing, parsing or encoding protocol messages.
///
/// None of these are fatal to the relay. A connection that produces one is
/// either dropped (framing errors) or has the offending frame ignored
/// (payload errors).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a frame header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header magic does not match [`crate::FrameHeader::MAGIC`]
    #[error("invalid magic number")]
    InvalidMagic,

    /// Header version is not [`crate::FrameHeader::VERSION`]
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds [`crate::FrameHeader::MAX_PAYLOAD_SIZE`]
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Claimed or actual payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Fewer payload bytes than the header claims
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Bytes claimed by the header
        expected: usize,
        /// Bytes present
        actual: usize,
    },

    /// Opcode not known to this protocol version
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),

    /// Text payload is not valid UTF-8
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    /// Opcode that carries no payload arrived with payload bytes
    #[error("opcode {opcode:#06x} carries no payload, got {len} bytes")]
    UnexpectedPayload {
        /// Offending opcode
        opcode: u16,
        /// Payload length received
        len: usize,
    },

    /// Line event JSON could not be encoded or decoded
    #[error("line event json: {0}")]
    Json(String),

    /// Underlying stream failed
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
