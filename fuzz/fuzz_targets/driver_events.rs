//! Fuzz target for the server driver
//!
//! Feeds arbitrary sequences of connects, raw frames, disconnects, clock
//! jumps and ticks to a `ServerDriver`.
//!
//! # Invariants
//!
//! - The driver never panics and never errors on events for live sessions
//! - Every claimed name is owned by exactly one live, named session
//! - Every claimed name has an inactivity deadline
//! - No more names than connections

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use parley_harness::SimEnv;
use parley_proto::{Frame, FrameHeader, Opcode, Payload};
use parley_server::{DriverConfig, ServerDriver, ServerEvent};

#[derive(Debug, Arbitrary)]
enum Step {
    Connect,
    Claim { client: u8, name: u8 },
    Say { client: u8, text: String },
    RawFrame { client: u8, opcode: u16, payload: Vec<u8> },
    Goodbye { client: u8 },
    Disconnect { client: u8 },
    Advance { millis: u16 },
    Tick,
    Shutdown,
}

const NAMES: [&str; 3] = ["alice", "bob", "carol"];

fuzz_target!(|steps: Vec<Step>| {
    let env = SimEnv::manual(0);
    let config = DriverConfig { idle_timeout: Duration::from_secs(2), max_connections: 8 };
    let Ok(mut driver) = ServerDriver::new(env.clone(), config) else {
        return;
    };

    let mut next_id = 1u64;

    for step in steps {
        let live: Vec<u64> = {
            let mut ids: Vec<u64> = driver.session_ids().collect();
            ids.sort_unstable();
            ids
        };
        let pick = |client: u8| live.get(usize::from(client) % live.len().max(1)).copied();

        let event = match step {
            Step::Connect => {
                let session_id = next_id;
                next_id += 1;
                Some(ServerEvent::ConnectionAccepted { session_id })
            },
            Step::Claim { client, name } => pick(client).map(|session_id| {
                let name = NAMES[usize::from(name) % NAMES.len()].to_string();
                frame_event(session_id, Payload::ClaimName(name))
            }),
            Step::Say { client, text } => {
                pick(client).map(|session_id| frame_event(session_id, Payload::SendMessage(text)))
            },
            Step::RawFrame { client, opcode, payload } => pick(client).and_then(|session_id| {
                let mut raw = FrameHeader::new(Opcode::SendMessage).to_bytes();
                raw[6..8].copy_from_slice(&opcode.to_be_bytes());
                let header = *FrameHeader::from_bytes(&raw).ok()?;
                let frame = Frame::new(header, Bytes::from(payload));
                Some(ServerEvent::FrameReceived { session_id, frame })
            }),
            Step::Goodbye { client } => {
                pick(client).map(|session_id| frame_event(session_id, Payload::Goodbye))
            },
            Step::Disconnect { client } => pick(client).map(|session_id| {
                ServerEvent::ConnectionClosed { session_id, reason: "fuzz".to_string() }
            }),
            Step::Advance { millis } => {
                env.advance(Duration::from_millis(u64::from(millis)));
                None
            },
            Step::Tick => Some(ServerEvent::Tick),
            Step::Shutdown => Some(ServerEvent::Shutdown),
        };

        if let Some(event) = event {
            driver.process_event(event).expect("events for live sessions must not fail");
        }

        assert!(driver.identity_count() <= driver.connection_count());
        for name in driver.claimed_names() {
            let owner = driver.owner_of(name).expect("claimed name has an owner");
            assert_eq!(driver.identity_of(owner), Some(name));
            assert!(driver.deadline_of(name).is_some());
        }
    }
});

fn frame_event(session_id: u64, payload: Payload) -> ServerEvent {
    match payload.into_frame() {
        Ok(frame) => ServerEvent::FrameReceived { session_id, frame },
        // Oversized text; a hang-up exercises the same cleanup path
        Err(_) => ServerEvent::ConnectionClosed { session_id, reason: "oversized".to_string() },
    }
}
