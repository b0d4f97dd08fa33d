//! Presence and chat events broadcast to connected clients.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A join, quit or chat event.
///
/// `time` is wall-clock milliseconds since the Unix epoch, captured when the
/// relay accepted the triggering action. Serialized as a JSON object tagged
/// by `type`:
///
/// ```text
/// {"type":"quit","time":1700000000000,"user":"alice"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LineEvent {
    /// A client claimed a name
    Join {
        /// Capture time (ms since epoch)
        time: u64,
        /// Claimed name
        user: String,
    },
    /// A named client went away
    Quit {
        /// Capture time (ms since epoch)
        time: u64,
        /// Name that was released
        user: String,
    },
    /// A named client sent a message
    Message {
        /// Capture time (ms since epoch)
        time: u64,
        /// Sender's name
        from: String,
        /// Message body
        text: String,
    },
}

impl LineEvent {
    /// Join event for `user`.
    pub fn join(time: u64, user: impl Into<String>) -> Self {
        Self::Join { time, user: user.into() }
    }

    /// Quit event for `user`.
    pub fn quit(time: u64, user: impl Into<String>) -> Self {
        Self::Quit { time, user: user.into() }
    }

    /// Message event from `from`.
    pub fn message(time: u64, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Message { time, from: from.into(), text: text.into() }
    }

    /// Capture time in milliseconds since the Unix epoch.
    #[must_use]
    pub fn time(&self) -> u64 {
        match self {
            Self::Join { time, .. } | Self::Quit { time, .. } | Self::Message { time, .. } => {
                *time
            },
        }
    }

    /// Name the event is about (joining/leaving user or message sender).
    #[must_use]
    pub fn user(&self) -> &str {
        match self {
            Self::Join { user, .. } | Self::Quit { user, .. } => user,
            Self::Message { from, .. } => from,
        }
    }

    /// JSON encoding used on the wire.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse the wire JSON encoding.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
