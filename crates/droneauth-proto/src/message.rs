//! Handshake messages and their binary encoding.
//!
//! # Design Rationale
//!
//! The tag byte already identifies the variant, so payloads carry no further
//! type information. Fixed-size fields (nonces, reason codes) are written raw;
//! variable-size fields carry a `u16` Big Endian length prefix.
//!
//! Decoding is strict. A frame decodes only if its payload is consumed exactly,
//! which rules out smuggling extra bytes behind a valid message.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    AuthFailureReason, IdentityToken, MAX_FIELD_LEN, MessageTag, NONCE_LEN, Nonce, Signature,
    errors::{DecodeError, Result},
};

/// Size of the length prefix in front of variable-length fields.
const LEN_PREFIX: usize = 2;

/// A decoded handshake message.
///
/// # Invariants
///
/// - **Tag Uniqueness**: Each variant maps to exactly one [`MessageTag`].
///
/// - **Round Trip**: `Message::decode(&m.encode()) == Ok(m)` for every value
///   that can be constructed, since field length limits are enforced by the
///   field types themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Drone asks to authenticate under `identity`
    AuthRequest {
        /// Identity the drone claims
        identity: IdentityToken,
    },
    /// Authenticator's challenge
    Challenge {
        /// Fresh nonce the drone must sign
        nonce: Nonce,
    },
    /// Drone's answer to a challenge
    Response {
        /// Nonce being answered, echoed back so stale answers can be told
        /// apart
        nonce: Nonce,
        /// Signature over the nonce
        signature: Signature,
    },
    /// Handshake succeeded
    AuthSuccess,
    /// Handshake failed
    AuthFailure {
        /// Why the authenticator rejected the handshake
        reason: AuthFailureReason,
    },
}

impl Message {
    /// Get the tag for this message variant
    #[must_use]
    pub const fn tag(&self) -> MessageTag {
        match self {
            Self::AuthRequest { .. } => MessageTag::AuthRequest,
            Self::Challenge { .. } => MessageTag::Challenge,
            Self::Response { .. } => MessageTag::Response,
            Self::AuthSuccess => MessageTag::AuthSuccess,
            Self::AuthFailure { .. } => MessageTag::AuthFailure,
        }
    }

    /// Number of bytes [`Message::encode`] will produce
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Self::AuthRequest { identity } => LEN_PREFIX + identity.len(),
            Self::Challenge { .. } => NONCE_LEN,
            Self::Response { signature, .. } => NONCE_LEN + LEN_PREFIX + signature.len(),
            Self::AuthSuccess => 0,
            Self::AuthFailure { .. } => 1,
        }
    }

    /// Encode message into buffer
    ///
    /// Infallible: every constructible message has an encoding.
    pub fn encode_into(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.tag().to_u8());

        match self {
            Self::AuthRequest { identity } => put_field(dst, identity.as_bytes()),
            Self::Challenge { nonce } => dst.put_slice(nonce.as_bytes()),
            Self::Response { nonce, signature } => {
                dst.put_slice(nonce.as_bytes());
                put_field(dst, signature.as_bytes());
            },
            Self::AuthSuccess => {},
            Self::AuthFailure { reason } => dst.put_u8(reason.to_u8()),
        }
    }

    /// Encode message into a fresh buffer
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode a message from a complete frame
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Truncated`] if `bytes` is empty
    /// - [`DecodeError::UnknownTag`] if the first byte names no message
    /// - [`DecodeError::MalformedPayload`] if the remaining bytes do not match
    ///   the variant's layout exactly
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some((&raw_tag, mut payload)) = bytes.split_first() else {
            return Err(DecodeError::Truncated);
        };

        let tag = MessageTag::from_u8(raw_tag).ok_or(DecodeError::UnknownTag(raw_tag))?;

        let message = match tag {
            MessageTag::AuthRequest => {
                let token = read_field(tag, &mut payload)?;
                let identity = IdentityToken::new(token)
                    .map_err(|_| malformed(tag, "identity token too long"))?;
                Self::AuthRequest { identity }
            },
            MessageTag::Challenge => Self::Challenge { nonce: read_nonce(tag, &mut payload)? },
            MessageTag::Response => {
                let nonce = read_nonce(tag, &mut payload)?;
                let raw = read_field(tag, &mut payload)?;
                let signature =
                    Signature::new(raw).map_err(|_| malformed(tag, "signature too long"))?;
                Self::Response { nonce, signature }
            },
            MessageTag::AuthSuccess => Self::AuthSuccess,
            MessageTag::AuthFailure => {
                if !payload.has_remaining() {
                    return Err(malformed(tag, "missing reason code"));
                }
                let code = payload.get_u8();
                let reason = AuthFailureReason::from_u8(code)
                    .ok_or_else(|| malformed(tag, "unknown reason code"))?;
                Self::AuthFailure { reason }
            },
        };

        if payload.has_remaining() {
            return Err(malformed(tag, "trailing bytes after payload"));
        }

        Ok(message)
    }
}

/// Decode a message from a complete frame.
///
/// Shorthand for [`Message::decode`].
///
/// # Errors
///
/// See [`Message::decode`].
pub fn decode(bytes: &[u8]) -> Result<Message> {
    Message::decode(bytes)
}

/// Encode a message into a fresh buffer.
///
/// Shorthand for [`Message::encode`].
#[must_use]
pub fn encode(message: &Message) -> Bytes {
    message.encode()
}

fn malformed(tag: MessageTag, reason: &'static str) -> DecodeError {
    DecodeError::MalformedPayload { tag, reason }
}

fn put_field(dst: &mut impl BufMut, field: &[u8]) {
    debug_assert!(field.len() <= MAX_FIELD_LEN);

    #[allow(clippy::cast_possible_truncation)]
    dst.put_u16(field.len() as u16);
    dst.put_slice(field);
}

fn read_nonce(tag: MessageTag, payload: &mut &[u8]) -> Result<Nonce> {
    if payload.remaining() < NONCE_LEN {
        return Err(malformed(tag, "nonce truncated"));
    }

    let mut nonce = [0u8; NONCE_LEN];
    payload.copy_to_slice(&mut nonce);
    Ok(Nonce::new(nonce))
}

fn read_field(tag: MessageTag, payload: &mut &[u8]) -> Result<Bytes> {
    if payload.remaining() < LEN_PREFIX {
        return Err(malformed(tag, "length prefix truncated"));
    }

    let len = usize::from(payload.get_u16());
    if len > MAX_FIELD_LEN {
        return Err(malformed(tag, "field length exceeds maximum"));
    }
    if payload.remaining() < len {
        return Err(malformed(tag, "field truncated"));
    }

    let field = Bytes::copy_from_slice(&payload.chunk()[..len]);
    payload.advance(len);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn nonce_strategy() -> impl Strategy<Value = Nonce> {
        any::<[u8; NONCE_LEN]>().prop_map(Nonce::new)
    }

    fn field_strategy() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..=MAX_FIELD_LEN)
    }

    fn reason_strategy() -> impl Strategy<Value = AuthFailureReason> {
        prop_oneof![
            Just(AuthFailureReason::BadSignature),
            Just(AuthFailureReason::UnknownSession),
            Just(AuthFailureReason::Timeout),
        ]
    }

    impl Arbitrary for Message {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                field_strategy().prop_map(|token| Message::AuthRequest {
                    identity: IdentityToken::new(token).expect("within limit"),
                }),
                nonce_strategy().prop_map(|nonce| Message::Challenge { nonce }),
                (nonce_strategy(), field_strategy()).prop_map(|(nonce, sig)| {
                    Message::Response { nonce, signature: Signature::new(sig).expect("within limit") }
                }),
                Just(Message::AuthSuccess),
                reason_strategy().prop_map(|reason| Message::AuthFailure { reason }),
            ]
            .boxed()
        }
    }

    proptest! {
        #[test]
        fn message_round_trip(message in any::<Message>()) {
            let wire = message.encode();
            prop_assert_eq!(wire.len(), message.encoded_len());

            let parsed = Message::decode(&wire).expect("should decode");
            prop_assert_eq!(message, parsed);
        }

        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
            // Either a message that re-encodes to the same bytes, or an error
            if let Ok(message) = Message::decode(&bytes) {
                prop_assert_eq!(&message.encode()[..], &bytes[..]);
            }
        }

        #[test]
        fn unknown_tags_always_rejected(tag in any::<u8>(), rest in prop::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(MessageTag::from_u8(tag).is_none());

            let mut frame = vec![tag];
            frame.extend_from_slice(&rest);
            prop_assert_eq!(Message::decode(&frame), Err(DecodeError::UnknownTag(tag)));
        }
    }

    #[test]
    fn empty_frame_is_truncated() {
        assert_eq!(Message::decode(&[]), Err(DecodeError::Truncated));
    }

    #[test]
    fn auth_success_round_trip() {
        let wire = Message::AuthSuccess.encode();
        assert_eq!(&wire[..], &[0x04]);
        assert_eq!(Message::decode(&wire), Ok(Message::AuthSuccess));
    }

    #[test]
    fn auth_success_with_trailing_bytes() {
        let err = Message::decode(&[0x04, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload { tag: MessageTag::AuthSuccess, .. }));
    }

    #[test]
    fn challenge_with_short_nonce() {
        let mut frame = vec![0x02];
        frame.extend_from_slice(&[0u8; NONCE_LEN - 1]);

        let err = Message::decode(&frame).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::Challenge,
            reason: "nonce truncated"
        });
    }

    #[test]
    fn auth_request_length_exceeds_payload() {
        // Claims 8 bytes, carries 3
        let frame = [0x01, 0x00, 0x08, b'a', b'b', b'c'];

        let err = Message::decode(&frame).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::AuthRequest,
            reason: "field truncated"
        });
    }

    #[test]
    fn auth_request_missing_length_prefix() {
        let err = Message::decode(&[0x01, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::AuthRequest,
            reason: "length prefix truncated"
        });
    }

    #[test]
    fn auth_request_oversized_length_rejected_before_reading() {
        let len = u16::try_from(MAX_FIELD_LEN + 1).unwrap().to_be_bytes();
        let mut frame = vec![0x01, len[0], len[1]];
        frame.resize(3 + MAX_FIELD_LEN + 1, b'x');

        let err = Message::decode(&frame).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::AuthRequest,
            reason: "field length exceeds maximum"
        });
    }

    #[test]
    fn response_missing_signature() {
        let mut frame = vec![0x03];
        frame.extend_from_slice(&[7u8; NONCE_LEN]);

        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload { tag: MessageTag::Response, .. }));
    }

    #[test]
    fn auth_failure_unknown_reason() {
        let err = Message::decode(&[0x05, 0x09]).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::AuthFailure,
            reason: "unknown reason code"
        });
    }

    #[test]
    fn auth_failure_missing_reason() {
        let err = Message::decode(&[0x05]).unwrap_err();
        assert_eq!(err, DecodeError::MalformedPayload {
            tag: MessageTag::AuthFailure,
            reason: "missing reason code"
        });
    }

    #[test]
    fn response_layout() {
        let message = Message::Response {
            nonce: Nonce::new([0x11; NONCE_LEN]),
            signature: Signature::new(vec![0xAA, 0xBB]).unwrap(),
        };

        let wire = message.encode();
        assert_eq!(wire[0], 0x03);
        assert_eq!(&wire[1..=NONCE_LEN], &[0x11; NONCE_LEN]);
        assert_eq!(&wire[NONCE_LEN + 1..], &[0x00, 0x02, 0xAA, 0xBB]);
    }

    #[test]
    fn free_functions_match_methods() {
        let message = Message::AuthFailure { reason: AuthFailureReason::Timeout };
        assert_eq!(encode(&message), message.encode());
        assert_eq!(decode(&encode(&message)), Ok(message));
    }
}
