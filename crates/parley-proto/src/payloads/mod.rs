//! Typed frame payloads.
//!
//! The opcode in the header decides how payload bytes are read. Names and
//! message text travel as raw UTF-8, line events as JSON, and control
//! messages carry no bytes at all.
//!
//! # Invariants
//!
//! Each [`Payload`] variant maps to exactly one [`Opcode`] (enforced by match
//! exhaustiveness in [`Payload::opcode`] and [`Payload::decode`]).

mod line;

use bytes::BufMut;
pub use line::LineEvent;

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    // Client -> relay
    /// Request to claim a display name
    ClaimName(String),
    /// Chat message text
    SendMessage(String),
    /// Graceful disconnect
    Goodbye,

    // Relay -> client
    /// The claim succeeded
    ClaimAccepted,
    /// The name is already taken (or the claim was otherwise refused)
    NameUnavailable,
    /// Presence or chat event
    Line(LineEvent),
    /// The relay is shutting down
    ServerShuttingDown,
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::ClaimName(_) => Opcode::ClaimName,
            Self::SendMessage(_) => Opcode::SendMessage,
            Self::Goodbye => Opcode::Goodbye,
            Self::ClaimAccepted => Opcode::ClaimAccepted,
            Self::NameUnavailable => Opcode::NameUnavailable,
            Self::Line(_) => Opcode::Line,
            Self::ServerShuttingDown => Opcode::ServerShuttingDown,
        }
    }

    /// Encode payload bytes (without header) into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::ClaimName(text) | Self::SendMessage(text) => dst.put_slice(text.as_bytes()),
            Self::Line(event) => dst.put_slice(&event.to_json()?),
            Self::Goodbye
            | Self::ClaimAccepted
            | Self::NameUnavailable
            | Self::ServerShuttingDown => {},
        }
        Ok(())
    }

    /// Decode payload bytes for a known opcode.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidUtf8` for non-UTF-8 names or text
    /// - `ProtocolError::Json` for malformed line events
    /// - `ProtocolError::UnexpectedPayload` if a control opcode has bytes
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if !opcode.has_payload() && !bytes.is_empty() {
            return Err(ProtocolError::UnexpectedPayload {
                opcode: opcode.to_u16(),
                len: bytes.len(),
            });
        }

        let text = || {
            std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| ProtocolError::InvalidUtf8)
        };

        Ok(match opcode {
            Opcode::ClaimName => Self::ClaimName(text()?),
            Opcode::SendMessage => Self::SendMessage(text()?),
            Opcode::Goodbye => Self::Goodbye,
            Opcode::ClaimAccepted => Self::ClaimAccepted,
            Opcode::NameUnavailable => Self::NameUnavailable,
            Opcode::Line => Self::Line(LineEvent::from_json(bytes)?),
            Opcode::ServerShuttingDown => Self::ServerShuttingDown,
        })
    }

    /// Build a complete frame for this payload.
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;

        if buf.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: buf.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Decode the payload carried by `frame`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is unrecognized
    /// - Any error from [`Payload::decode`]
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_name_is_raw_utf8() {
        let frame = Payload::ClaimName("zoë".to_string()).into_frame().unwrap();
        assert_eq!(frame.header.opcode_enum(), Some(Opcode::ClaimName));
        assert_eq!(&frame.payload[..], "zoë".as_bytes());
        assert_eq!(Payload::from_frame(&frame).unwrap(), Payload::ClaimName("zoë".to_string()));
    }

    #[test]
    fn control_frames_are_empty() {
        for payload in [
            Payload::Goodbye,
            Payload::ClaimAccepted,
            Payload::NameUnavailable,
            Payload::ServerShuttingDown,
        ] {
            let frame = payload.clone().into_frame().unwrap();
            assert!(frame.payload.is_empty());
            assert_eq!(Payload::from_frame(&frame).unwrap(), payload);
        }
    }

    #[test]
    fn line_frame_carries_json() {
        let frame = Payload::Line(LineEvent::join(10, "alice")).into_frame().unwrap();
        assert_eq!(&frame.payload[..], br#"{"type":"join","time":10,"user":"alice"}"#);
    }

    #[test]
    fn reject_invalid_utf8_text() {
        let result = Payload::decode(Opcode::SendMessage, &[0xff, 0xfe]);
        assert_eq!(result, Err(ProtocolError::InvalidUtf8));
    }

    #[test]
    fn reject_bytes_on_control_opcode() {
        let result = Payload::decode(Opcode::Goodbye, b"bye");
        assert_eq!(result, Err(ProtocolError::UnexpectedPayload { opcode: 0x0003, len: 3 }));
    }

    #[test]
    fn reject_unknown_opcode() {
        let mut header = FrameHeader::new(Opcode::Goodbye);
        header.opcode = 0x0999u16.to_be_bytes();
        let frame = Frame::new(header, Vec::new());

        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownOpcode(0x0999)));
    }

    #[test]
    fn oversized_message_cannot_be_framed() {
        let text = "x".repeat(FrameHeader::MAX_PAYLOAD_SIZE as usize + 1);
        let result = Payload::SendMessage(text).into_frame();
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
    }
}
