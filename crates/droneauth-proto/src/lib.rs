//! # Drone Authentication Protocol: Wire Format
//!
//! This crate implements the binary codec for the challenge-response
//! handshake between a drone (client) and a ground station (authenticator).
//!
//! ## Wire Layout
//!
//! Every message is a single datagram: one tag byte followed by a
//! variant-specific payload. Multi-byte integers are Big Endian.
//!
//! ```text
//! 0x01 AuthRequest   [u16 len][identity token]
//! 0x02 Challenge     [nonce: 32 bytes]
//! 0x03 Response      [nonce: 32 bytes][u16 len][signature]
//! 0x04 AuthSuccess   (empty)
//! 0x05 AuthFailure   [reason code: u8]
//! ```
//!
//! ## Security Properties
//!
//! - **Total Decoding**: [`decode`] is defined for every byte sequence. It
//!   returns either a [`Message`] or a [`DecodeError`], never panics, and never
//!   maps an unknown tag onto a known variant.
//!
//! - **Strict Layouts**: Length prefixes are bounded by [`MAX_FIELD_LEN`] and
//!   trailing bytes are rejected, so one message has exactly one encoding.
//!
//! - **No Crypto**: Signatures are opaque bytes here. Producing and checking
//!   them is the job of capabilities injected into the state machines.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod message;
pub mod reason;
pub mod tag;
pub mod types;

pub use errors::{DecodeError, FieldTooLong, Result};
pub use message::{Message, decode, encode};
pub use reason::AuthFailureReason;
pub use tag::MessageTag;
pub use types::{IdentityToken, MAX_FIELD_LEN, NONCE_LEN, Nonce, Signature};
