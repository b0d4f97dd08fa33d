//! Async frame reading and writing over byte streams.
//!
//! Works on any tokio `AsyncRead`/`AsyncWrite`: QUIC streams in production,
//! simulated TCP in the harness, in-memory pipes in tests.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    Frame, FrameHeader,
    errors::{ProtocolError, Result},
};

/// Read the next frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends before a new header starts.
///
/// # Errors
///
/// - Header validation errors from [`FrameHeader::from_bytes`]
/// - `ProtocolError::FrameTruncated` if the stream ends mid-header or
///   mid-payload
/// - `ProtocolError::Io` for other stream failures
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    let mut filled = 0;
    while filled < FrameHeader::SIZE {
        let n = reader.read(&mut header_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::FrameTruncated {
                expected: FrameHeader::SIZE,
                actual: filled,
            });
        }
        filled += n;
    }

    let header = *FrameHeader::from_bytes(&header_buf)?;
    let payload_size = header.payload_size() as usize;

    let mut payload = vec![0u8; payload_size];
    if let Err(e) = reader.read_exact(&mut payload).await {
        if e.kind() == ErrorKind::UnexpectedEof {
            return Err(ProtocolError::FrameTruncated { expected: payload_size, actual: 0 });
        }
        return Err(e.into());
    }

    Ok(Some(Frame::new(header, payload)))
}

/// Write `frame` to `writer` and flush.
///
/// # Errors
///
/// - `ProtocolError::PayloadTooLarge` if the frame cannot be encoded
/// - `ProtocolError::Io` if the stream fails
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(FrameHeader::SIZE + frame.payload.len());
    frame.encode(&mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}
