//! Operation codes.

/// Frame operation code.
///
/// Client opcodes live in `0x00xx`, relay opcodes in `0x01xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    /// Claim a display name (payload: UTF-8 name)
    ClaimName = 0x0001,
    /// Send a chat message (payload: UTF-8 text)
    SendMessage = 0x0002,
    /// Graceful disconnect (no payload)
    Goodbye = 0x0003,

    /// Name claim succeeded (no payload)
    ClaimAccepted = 0x0101,
    /// Name claim rejected (no payload)
    NameUnavailable = 0x0102,
    /// Join/quit/message event (payload: JSON line event)
    Line = 0x0103,
    /// Relay is going away (no payload)
    ServerShuttingDown = 0x0104,
}

impl Opcode {
    /// Wire representation.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire opcode. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::ClaimName),
            0x0002 => Some(Self::SendMessage),
            0x0003 => Some(Self::Goodbye),
            0x0101 => Some(Self::ClaimAccepted),
            0x0102 => Some(Self::NameUnavailable),
            0x0103 => Some(Self::Line),
            0x0104 => Some(Self::ServerShuttingDown),
            _ => None,
        }
    }

    /// Whether clients are allowed to send this opcode.
    #[must_use]
    pub const fn is_client_opcode(self) -> bool {
        matches!(self, Self::ClaimName | Self::SendMessage | Self::Goodbye)
    }

    /// Whether frames with this opcode carry payload bytes.
    #[must_use]
    pub const fn has_payload(self) -> bool {
        matches!(self, Self::ClaimName | Self::SendMessage | Self::Line)
    }
}
