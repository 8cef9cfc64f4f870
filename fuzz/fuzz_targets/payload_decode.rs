//! Fuzz target for Payload::from_frame
//!
//! Arbitrary CBOR under every message type: malformed input, type confusion
//! and oversized collections must come back as errors, never panics.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use taulight_proto::{ChainId, Frame, FrameHeader, MessageType, Payload};

#[derive(Debug, Arbitrary)]
struct Input {
    chain: u32,
    body: Vec<u8>,
}

fuzz_target!(|input: Input| {
    for message_type in MessageType::ALL {
        let header = FrameHeader::new(message_type).with_chain_id(ChainId::new(input.chain));
        let frame = Frame::new(header, Bytes::copy_from_slice(&input.body));

        if let Ok(payload) = Payload::from_frame(&frame) {
            assert_eq!(payload.message_type(), message_type);
        }
    }
});
