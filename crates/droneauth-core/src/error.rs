//! Error types for the handshake core.
//!
//! - [`ProtocolError`]: a peer sent something that does not fit the current
//!   state. Absorbed (no-op) or answered with `AuthFailure`, never fatal.
//! - [`HandshakeError`]: the local caller used the client API out of order.

use droneauth_proto::MessageTag;
use thiserror::Error;

use crate::session::AuthState;

/// Protocol-level errors caused by inbound messages.
///
/// None of these are fatal. The dispatcher logs them and moves on; at most
/// one session's outcome is affected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Message is inconsistent with the session state (duplicate, reordered,
    /// or sent to the wrong role). Ignored with no state change.
    #[error("stale {tag:?} message in state {state:?}")]
    StaleMessage {
        /// Session state when the message arrived
        state: AuthState,
        /// Tag of the ignored message
        tag: MessageTag,
    },

    /// No session exists for the peer that sent a response
    #[error("no handshake session for peer")]
    UnknownSession,

    /// Response echoes a nonce other than the one currently issued
    #[error("response nonce does not match the issued challenge")]
    NonceMismatch,

    /// Message came from a peer other than the one this client authenticates
    /// against
    #[error("message from unexpected peer")]
    UnexpectedPeer,
}

/// Errors from misuse of the local handshake API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Operation not allowed in the current state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when the error occurred
        state: AuthState,
        /// Operation that was attempted
        operation: &'static str,
    },
}
