//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes must never panic the frame parser. Anything that decodes
//! must re-encode to the bytes it was read from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{Frame, FrameHeader};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let mut encoded = Vec::new();
    if frame.encode(&mut encoded).is_ok() {
        let consumed = FrameHeader::SIZE + frame.payload.len();
        assert_eq!(&encoded[..], &data[..consumed]);
    }
});
