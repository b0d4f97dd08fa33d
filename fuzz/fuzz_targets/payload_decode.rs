//! Fuzz target for Payload decoding
//!
//! Every opcode paired with arbitrary payload bytes must either decode or
//! return an error. Line events that decode must survive a JSON round trip.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_proto::{LineEvent, Opcode, Payload};

#[derive(Debug, Arbitrary)]
struct Input {
    opcode: u16,
    payload: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let Some(opcode) = Opcode::from_u16(input.opcode) else {
        return;
    };

    let Ok(payload) = Payload::decode(opcode, &input.payload) else {
        return;
    };
    assert_eq!(payload.opcode(), opcode);

    if let Payload::Line(line) = payload {
        let json = line.to_json().expect("decoded line must re-encode");
        assert_eq!(LineEvent::from_json(&json).ok(), Some(line));
    }
});
