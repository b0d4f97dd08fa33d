//! Frame type combining header and payload.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire: `[FrameHeader: 16 bytes] + [payload: variable]`.
///
/// # Invariants
///
/// - `payload.len()` equals `header.payload_size()`. Enforced by
///   [`Frame::new`] and checked by [`Frame::decode`].
/// - Encoded frames never exceed [`FrameHeader::MAX_PAYLOAD_SIZE`] of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,

    /// Raw payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame, setting the header's payload size to match.
    ///
    /// Oversized payloads are accepted here and rejected by
    /// [`Frame::encode`].
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();

        // Bytes is bounded by isize::MAX; anything past u32::MAX saturates and
        // is rejected by encode() as too large.
        let payload_len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        header.payload_size = payload_len.to_be_bytes();

        Self { header, payload }
    }

    /// Encode frame into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds the limit
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode a frame from a contiguous buffer.
    ///
    /// Trailing bytes past the claimed payload are ignored.
    ///
    /// # Errors
    ///
    /// - Any header validation error from [`FrameHeader::from_bytes`]
    /// - `ProtocolError::FrameTruncated` if the payload is incomplete
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;
        let payload_size = header.payload_size() as usize;

        let payload = bytes.get(FrameHeader::SIZE..FrameHeader::SIZE + payload_size).ok_or(
            ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            },
        )?;

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    #[test]
    fn new_sets_payload_size() {
        let frame = Frame::new(FrameHeader::new(Opcode::SendMessage), &b"hello"[..]);
        assert_eq!(frame.header.payload_size(), 5);
    }

    #[test]
    fn encode_then_decode_preserves_frame() {
        let frame = Frame::new(FrameHeader::new(Opcode::ClaimName), &b"alice"[..]);

        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();
        assert_eq!(wire.len(), FrameHeader::SIZE + 5);

        assert_eq!(Frame::decode(&wire).unwrap(), frame);
    }

    #[test]
    fn reject_truncated_frame() {
        let frame = Frame::new(FrameHeader::new(Opcode::SendMessage), vec![7u8; 100]);
        let mut wire = Vec::new();
        frame.encode(&mut wire).unwrap();

        let result = Frame::decode(&wire[..FrameHeader::SIZE + 40]);
        assert_eq!(result, Err(ProtocolError::FrameTruncated { expected: 100, actual: 40 }));
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![0u8; FrameHeader::MAX_PAYLOAD_SIZE as usize + 1];
        let frame = Frame::new(FrameHeader::new(Opcode::SendMessage), payload);

        let mut wire = Vec::new();
        assert!(matches!(frame.encode(&mut wire), Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(wire.is_empty());
    }
}
