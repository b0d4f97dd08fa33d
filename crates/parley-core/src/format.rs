//! Human-readable rendering of line events.

use chrono::{DateTime, Utc};
use parley_proto::LineEvent;

/// Render `event` as a log/chat line, timestamped in UTC.
///
/// ```text
/// [09:15:02] * alice joined
/// [09:15:07] <alice> hi
/// [09:16:30] * alice left
/// ```
pub fn format_line(event: &LineEvent) -> String {
    let stamp = clock(event.time());
    match event {
        LineEvent::Join { user, .. } => format!("[{stamp}] * {user} joined"),
        LineEvent::Quit { user, .. } => format!("[{stamp}] * {user} left"),
        LineEvent::Message { from, text, .. } => format!("[{stamp}] <{from}> {text}"),
    }
}

fn clock(millis: u64) -> String {
    // Out-of-range stamps render as the epoch
    let at = i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default();
    at.format("%H:%M:%S").to_string()
}
