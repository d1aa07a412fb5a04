//! Message tags.
//!
//! The first byte of every frame identifies the message. The set of tags is
//! closed: anything outside it is rejected with
//! [`DecodeError::UnknownTag`](crate::DecodeError::UnknownTag).

/// Leading tag byte of a handshake message.
///
/// # Security
///
/// - **Unknown Tags**: [`MessageTag::from_u8`] returns `None` for unknown
///   values. There is no catch-all variant, so a corrupted or hostile frame can
///   never be routed as if it were a known message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    /// Client asks to authenticate
    AuthRequest = 0x01,
    /// Authenticator issues a nonce
    Challenge = 0x02,
    /// Client answers the challenge
    Response = 0x03,
    /// Authenticator accepted the response
    AuthSuccess = 0x04,
    /// Authenticator rejected the handshake
    AuthFailure = 0x05,
}

impl MessageTag {
    /// All tags in wire order.
    pub const ALL: [Self; 5] =
        [Self::AuthRequest, Self::Challenge, Self::Response, Self::AuthSuccess, Self::AuthFailure];

    /// Convert to raw byte value
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from raw byte value
    ///
    /// Total over `u8`; returns `None` for values that name no message.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::AuthRequest),
            0x02 => Some(Self::Challenge),
            0x03 => Some(Self::Response),
            0x04 => Some(Self::AuthSuccess),
            0x05 => Some(Self::AuthFailure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for tag in MessageTag::ALL {
            assert_eq!(MessageTag::from_u8(tag.to_u8()), Some(tag));
        }
    }

    #[test]
    fn invalid_tag() {
        assert_eq!(MessageTag::from_u8(0x00), None);
        assert_eq!(MessageTag::from_u8(0x06), None);
        assert_eq!(MessageTag::from_u8(0xFF), None);
    }

    #[test]
    fn exactly_five_tags_are_known() {
        let known = (0..=u8::MAX).filter(|b| MessageTag::from_u8(*b).is_some()).count();
        assert_eq!(known, MessageTag::ALL.len());
    }
}
