//! Property-based tests for frame decoding.
//!
//! Decoding must never panic on arbitrary input, and every payload the relay
//! can produce must survive the wire unchanged.

use parley_proto::{Frame, FrameHeader, LineEvent, Opcode, Payload};
use proptest::prelude::*;

fn arbitrary_line_event() -> impl Strategy<Value = LineEvent> {
    prop_oneof![
        (any::<u64>(), ".{1,64}").prop_map(|(time, user)| LineEvent::join(time, user)),
        (any::<u64>(), ".{1,64}").prop_map(|(time, user)| LineEvent::quit(time, user)),
        (any::<u64>(), ".{1,64}", ".{0,256}")
            .prop_map(|(time, from, text)| LineEvent::message(time, from, text)),
    ]
}

fn arbitrary_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        ".{0,64}".prop_map(Payload::ClaimName),
        ".{0,512}".prop_map(Payload::SendMessage),
        Just(Payload::Goodbye),
        Just(Payload::ClaimAccepted),
        Just(Payload::NameUnavailable),
        Just(Payload::ServerShuttingDown),
        arbitrary_line_event().prop_map(Payload::Line),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: arbitrary bytes never panic the decoder
    #[test]
    fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Frame::decode(&bytes);
    }

    /// Property: a valid header with random opcode/payload either decodes to
    /// a payload or yields a typed error, never a panic
    #[test]
    fn prop_payload_decode_is_total(
        opcode in any::<u16>(),
        payload in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        if let Some(opcode) = Opcode::from_u16(opcode) {
            let frame = Frame::new(FrameHeader::new(opcode), payload);
            let _ = Payload::from_frame(&frame);
        }
    }

    /// Property: payloads survive encode -> wire -> decode
    #[test]
    fn prop_payload_survives_wire(payload in arbitrary_payload()) {
        let frame = payload.clone().into_frame()?;

        let mut wire = Vec::new();
        frame.encode(&mut wire)?;
        let decoded = Frame::decode(&wire)?;

        prop_assert_eq!(Payload::from_frame(&decoded)?, payload);
    }
}
