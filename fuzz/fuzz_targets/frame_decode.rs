//! Fuzz target for Frame::decode
//!
//! Arbitrary bytes through the header and length checks. Decoding must never
//! panic, and any frame that decodes must re-encode to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use taulight_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let mut encoded = Vec::new();
    frame.encode(&mut encoded).expect("decoded frame must encode");
    assert_eq!(&data[..encoded.len()], encoded.as_slice());
});
