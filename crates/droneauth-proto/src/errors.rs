//! Error types for the wire codec.
//!
//! All errors are structured and comparable so tests can assert on the exact
//! failure instead of matching strings.

use thiserror::Error;

use crate::MessageTag;

/// Errors produced while decoding an inbound frame.
///
/// Decode failures are always recovered locally: the frame is dropped and a
/// diagnostic is logged. They never become a session-level failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame is empty, so there is no tag byte to classify
    #[error("frame truncated: missing message tag")]
    Truncated,

    /// Tag byte does not name any known message
    #[error("unknown message tag: {0:#04x}")]
    UnknownTag(u8),

    /// Payload does not satisfy the layout required by its tag
    #[error("malformed {tag:?} payload: {reason}")]
    MalformedPayload {
        /// Tag of the frame whose payload was rejected
        tag: MessageTag,
        /// What was wrong with the payload
        reason: &'static str,
    },
}

/// A variable-length field exceeded [`MAX_FIELD_LEN`](crate::MAX_FIELD_LEN).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} too long: {len} bytes exceeds maximum {max}")]
pub struct FieldTooLong {
    /// Name of the offending field
    pub field: &'static str,
    /// Actual length in bytes
    pub len: usize,
    /// Maximum allowed length
    pub max: usize,
}

/// Convenient Result type alias for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;
