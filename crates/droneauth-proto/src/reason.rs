//! Failure reasons carried in `AuthFailure`.

use std::fmt;

/// Why the authenticator rejected a handshake.
///
/// These are the only failures visible to the opposite peer. Everything else
/// (decode errors, stale messages) is handled locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthFailureReason {
    /// Signature over the nonce did not verify
    BadSignature = 0x01,
    /// No session matches the response (never requested, expired, or stale
    /// nonce)
    UnknownSession = 0x02,
    /// Session expired before the handshake completed
    Timeout = 0x03,
}

impl AuthFailureReason {
    /// Convert to raw reason code
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from raw reason code
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::BadSignature),
            0x02 => Some(Self::UnknownSession),
            0x03 => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::BadSignature => "bad signature",
            Self::UnknownSession => "unknown session",
            Self::Timeout => "timeout",
        };
        f.write_str(text)
    }
}
