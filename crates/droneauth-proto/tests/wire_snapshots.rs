//! Snapshot tests for wire format stability.
//!
//! Each message is encoded and rendered as hex. If the wire format changes,
//! these tests fail, so a ground station and a drone built from different
//! revisions cannot silently disagree.

use droneauth_proto::{AuthFailureReason, IdentityToken, Message, NONCE_LEN, Nonce, Signature};
use insta::assert_snapshot;

/// Helper to encode a message to a hex string for snapshot
fn message_to_hex(message: &Message) -> String {
    hex::encode(message.encode())
}

fn counting_nonce() -> Nonce {
    let mut bytes = [0u8; NONCE_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = i as u8;
    }
    Nonce::new(bytes)
}

#[test]
fn snapshot_auth_request() {
    let message =
        Message::AuthRequest { identity: IdentityToken::new("drone-7").expect("valid identity") };

    assert_snapshot!(message_to_hex(&message), @"01000764726f6e652d37");
}

#[test]
fn snapshot_auth_request_empty_identity() {
    let message = Message::AuthRequest { identity: IdentityToken::new("").expect("valid identity") };

    assert_snapshot!(message_to_hex(&message), @"010000");
}

#[test]
fn snapshot_challenge() {
    let message = Message::Challenge { nonce: counting_nonce() };

    assert_snapshot!(
        message_to_hex(&message),
        @"02000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f"
    );
}

#[test]
fn snapshot_response() {
    let message = Message::Response {
        nonce: Nonce::new([0xAB; NONCE_LEN]),
        signature: Signature::new(vec![0xde, 0xad, 0xbe, 0xef]).expect("valid signature"),
    };

    assert_snapshot!(
        message_to_hex(&message),
        @"03abababababababababababababababababababababababababababababababab0004deadbeef"
    );
}

#[test]
fn snapshot_auth_success() {
    assert_snapshot!(message_to_hex(&Message::AuthSuccess), @"04");
}

#[test]
fn snapshot_auth_failure_reasons() {
    let bad_signature = Message::AuthFailure { reason: AuthFailureReason::BadSignature };
    let unknown_session = Message::AuthFailure { reason: AuthFailureReason::UnknownSession };
    let timeout = Message::AuthFailure { reason: AuthFailureReason::Timeout };

    assert_snapshot!(message_to_hex(&bad_signature), @"0501");
    assert_snapshot!(message_to_hex(&unknown_session), @"0502");
    assert_snapshot!(message_to_hex(&timeout), @"0503");
}

#[test]
fn snapshots_decode_back() {
    let frames = [
        "01000764726f6e652d37",
        "02000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        "04",
        "0502",
    ];

    for frame in frames {
        let bytes = hex::decode(frame).expect("valid hex");
        let message = Message::decode(&bytes).expect("snapshot frame should decode");
        assert_eq!(message_to_hex(&message), frame);
    }
}
