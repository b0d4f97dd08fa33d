//! Frame header with zero-copy parsing.
//!
//! The header is a fixed 16-byte structure serialized as raw big-endian
//! binary. The relay reads the opcode and payload size straight out of the
//! network buffer without copying.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 16-byte frame header (big endian)
///
/// ```text
/// 0      4        5      6        8              12          16
/// +------+--------+------+--------+--------------+-----------+
/// | PRLY | version| flags| opcode | payload_size | reserved  |
/// +------+--------+------+--------+--------------+-----------+
/// ```
///
/// Fields are byte arrays so the struct has alignment 1 and no padding; every
/// 16-byte pattern is a structurally valid value, which is what lets
/// `zerocopy` cast untrusted bytes safely. Semantic validation (magic,
/// version, size limit) happens in [`FrameHeader::from_bytes`].
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    flags: u8,
    pub(crate) opcode: [u8; 2],
    pub(crate) payload_size: [u8; 4],
    reserved: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 16;

    /// Magic number: "PRLY" in ASCII
    pub const MAGIC: u32 = 0x5052_4C59;

    /// Current protocol version
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (64 KiB)
    pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024;

    /// Create a header for `opcode` with an empty payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            flags: 0,
            opcode: opcode.to_u16().to_be_bytes(),
            payload_size: [0; 4],
            reserved: [0; 4],
        }
    }

    /// Parse a header from the front of `bytes` without copying.
    ///
    /// Trailing bytes (the payload) are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 16 bytes are available
    /// - `ProtocolError::InvalidMagic` if the magic number is wrong
    /// - `ProtocolError::UnsupportedVersion` if the version is not 1
    /// - `ProtocolError::PayloadTooLarge` if the claimed size exceeds the limit
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(self.as_bytes());
        arr
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Operation code as raw u16.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode())
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }
}

impl fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHeader")
            .field("version", &self.version)
            .field("opcode", &format_args!("{:#06x}", self.opcode()))
            .field("payload_size", &self.payload_size())
            .finish_non_exhaustive()
    }
}
