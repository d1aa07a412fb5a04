//! Exhaustive positive space fuzzer for message encoding/decoding
//!
//! Unlike random fuzzing (message_decode.rs), this fuzzer EXHAUSTIVELY tests
//! every message kind against edge-case field lengths:
//! - Empty, single-byte, and maximum-length identity tokens and signatures
//! - Every failure reason
//!
//! The fuzz input only chooses the field contents, so every combination is
//! reached on each run.

#![no_main]

use droneauth_proto::{
    AuthFailureReason, IdentityToken, MAX_FIELD_LEN, Message, NONCE_LEN, Nonce, Signature,
};
use libfuzzer_sys::fuzz_target;

// Edge-case lengths for variable fields
const FIELD_LENS: &[usize] = &[0, 1, 2, 255, 256, MAX_FIELD_LEN - 1, MAX_FIELD_LEN];

const ALL_REASONS: &[AuthFailureReason] = &[
    AuthFailureReason::BadSignature,
    AuthFailureReason::UnknownSession,
    AuthFailureReason::Timeout,
];

fn field(data: &[u8], len: usize) -> Vec<u8> {
    (0..len).map(|i| data.get(i % data.len().max(1)).copied().unwrap_or(0)).collect()
}

fn nonce(data: &[u8]) -> Nonce {
    let mut bytes = [0u8; NONCE_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = data.get(i).copied().unwrap_or(i as u8);
    }
    Nonce::new(bytes)
}

fn check(message: Message) {
    let encoded = message.encode();
    assert_eq!(encoded.len(), message.encoded_len());

    let decoded = Message::decode(&encoded).expect("valid message must decode");
    assert_eq!(decoded, message);

    // Every strict prefix is truncated or malformed, never a different message
    for cut in 0..encoded.len() {
        assert!(Message::decode(&encoded[..cut]).is_err(), "prefix of {cut} bytes decoded");
    }
}

fuzz_target!(|data: &[u8]| {
    let nonce = nonce(data);

    check(Message::Challenge { nonce });
    check(Message::AuthSuccess);
    for &reason in ALL_REASONS {
        check(Message::AuthFailure { reason });
    }

    for &len in FIELD_LENS {
        let identity = IdentityToken::new(field(data, len)).expect("length within limit");
        check(Message::AuthRequest { identity });

        let signature = Signature::new(field(data, len)).expect("length within limit");
        check(Message::Response { nonce, signature });
    }
});
