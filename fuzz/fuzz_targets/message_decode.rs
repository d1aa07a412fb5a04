//! Random-input fuzzer for message decoding.
//!
//! Decoding must never panic, and anything that decodes must re-encode to the
//! exact input bytes (the wire format has no redundant encodings).

#![no_main]

use droneauth_proto::Message;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = Message::decode(data) {
        let encoded = message.encode();
        assert_eq!(&encoded[..], data, "re-encoding changed the bytes");
        assert_eq!(message.encoded_len(), data.len());
    }
});
