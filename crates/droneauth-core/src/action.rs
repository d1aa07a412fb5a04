//! Actions returned by the handshake state machines.
//!
//! The driver (test harness or production node) executes these actions:
//! - `Send`: encode the message and hand it to the transport
//! - `Authenticated` / `Rejected`: report the outcome to the embedding
//!   application

use droneauth_proto::{AuthFailureReason, IdentityToken, Message};

/// Something the driver must do after a state machine step.
///
/// Generic over `P`, the transport-level peer identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAction<P> {
    /// Send this message to the peer
    Send {
        /// Destination
        peer: P,
        /// Message to encode and send
        message: Message,
    },

    /// The handshake with `peer` reached [`AuthState::Authenticated`](crate::AuthState::Authenticated)
    Authenticated {
        /// Peer on the other side of the handshake
        peer: P,
        /// Identity that was proven
        identity: IdentityToken,
    },

    /// The handshake with `peer` reached [`AuthState::Rejected`](crate::AuthState::Rejected)
    Rejected {
        /// Peer on the other side of the handshake
        peer: P,
        /// Why it was rejected
        reason: AuthFailureReason,
    },
}

impl<P> HandshakeAction<P> {
    /// The message to send, if this is a `Send` action
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Send { message, .. } => Some(message),
            _ => None,
        }
    }
}
