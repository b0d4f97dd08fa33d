//! Parley wire protocol.
//!
//! Every message between a client and the relay is a [`Frame`]: a fixed
//! 16-byte binary header followed by an opaque payload. The header carries the
//! [`Opcode`] so the relay can dispatch without touching the payload; typed
//! access goes through [`Payload::from_frame`] and [`Payload::into_frame`].
//!
//! # Message set
//!
//! Client to relay: `ClaimName`, `SendMessage`, `Goodbye`.
//! Relay to client: `ClaimAccepted`, `NameUnavailable`, `Line`,
//! `ServerShuttingDown`.
//!
//! `Line` frames carry a [`LineEvent`] as JSON:
//!
//! ```text
//! {"type":"join","time":1700000000000,"user":"alice"}
//! {"type":"message","time":1700000000500,"from":"alice","text":"hi"}
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;

pub use codec::{read_frame, write_frame};
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::{LineEvent, Payload};

/// ALPN protocol identifier negotiated on QUIC connections.
pub const ALPN_PROTOCOL: &[u8] = b"parley";

/// Longest display name a client may claim, in bytes.
pub const MAX_NAME_LEN: usize = 64;

/// Longest chat message text, in bytes.
pub const MAX_MESSAGE_LEN: usize = 4096;
