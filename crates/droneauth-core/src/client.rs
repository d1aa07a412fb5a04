//! Drone-side handshake state machine.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as parameter (no stored Environment)
//! - Methods return actions; the driver executes them
//! - Messages inconsistent with the current state are ignored, which makes
//!   the machine correct under duplicated, reordered, or lost frames
//!
//! # Lifecycle
//!
//! 1. **Idle**: nothing sent yet
//! 2. **RequestSent**: `AuthRequest` sent, waiting for `Challenge`
//! 3. **ChallengeReceived → ResponseSent**: nonce signed and answered
//! 4. **Authenticated** / **Rejected**: terminal
//!
//! # Retries
//!
//! The machine never retries on its own. A caller that wants to re-send
//! `AuthRequest` calls [`ClientHandshake::start`] again while the handshake is
//! still live; after a terminal outcome it calls [`ClientHandshake::reset`]
//! first.

use std::{fmt, time::Duration, time::Instant};

use droneauth_proto::{AuthFailureReason, IdentityToken, Message};

use crate::{
    action::HandshakeAction,
    capability::Signer,
    error::{HandshakeError, ProtocolError},
    session::{AuthState, HandshakeSession},
};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long a live handshake may go without progress before
    /// [`ClientHandshake::tick`] rejects it locally
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { handshake_timeout: Duration::from_secs(10) }
    }
}

/// Drone-side handshake bound to one authenticator peer.
///
/// Owns the node's single active-session slot.
pub struct ClientHandshake<S, P> {
    identity: IdentityToken,
    authenticator: P,
    signer: S,
    config: ClientConfig,
    session: HandshakeSession<P>,
}

impl<S, P> ClientHandshake<S, P>
where
    S: Signer,
    P: Clone + Eq + fmt::Debug,
{
    /// Create a client in [`AuthState::Idle`]
    pub fn new(
        identity: IdentityToken,
        authenticator: P,
        signer: S,
        config: ClientConfig,
        now: Instant,
    ) -> Self {
        let session = HandshakeSession::new(authenticator.clone(), now);
        Self { identity, authenticator, signer, config, session }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    /// The active session
    pub fn session(&self) -> &HandshakeSession<P> {
        &self.session
    }

    /// Identity this drone claims
    pub fn identity(&self) -> &IdentityToken {
        &self.identity
    }

    /// Peer this drone authenticates against
    pub fn authenticator(&self) -> &P {
        &self.authenticator
    }

    /// Why the handshake was rejected, if it was
    #[must_use]
    pub fn rejection(&self) -> Option<AuthFailureReason> {
        self.session.rejection()
    }

    /// Begin (or re-send) the handshake.
    ///
    /// From `Idle` this moves to `RequestSent`. From `RequestSent` or
    /// `ResponseSent` it is a retry: the request is sent again, the session
    /// returns to `RequestSent`, and the retry count grows.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the handshake is already terminal.
    pub fn start(&mut self, now: Instant) -> Result<Vec<HandshakeAction<P>>, HandshakeError> {
        match self.session.state() {
            AuthState::Idle => {
                self.session.advance(AuthState::RequestSent, now);
            },
            AuthState::RequestSent | AuthState::ChallengeReceived | AuthState::ResponseSent => {
                self.session.restart(AuthState::RequestSent, now);
                tracing::debug!(
                    peer = ?self.authenticator,
                    retry = self.session.retry_count(),
                    "re-sending auth request"
                );
            },
            state => {
                return Err(HandshakeError::InvalidState { state, operation: "start" });
            },
        }

        Ok(vec![self.send(Message::AuthRequest { identity: self.identity.clone() })])
    }

    /// Replace the active session with a fresh `Idle` one.
    pub fn reset(&mut self, now: Instant) {
        self.session = HandshakeSession::new(self.authenticator.clone(), now);
    }

    /// Process a message received from `from` and return actions.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when the message is ignored. The state is
    /// unchanged and nothing is emitted in that case.
    pub fn handle_message(
        &mut self,
        from: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        if *from != self.authenticator {
            return Err(ProtocolError::UnexpectedPeer);
        }

        let state = self.session.state();

        match (state, message) {
            (AuthState::RequestSent, Message::Challenge { nonce }) => {
                self.session.set_nonce(nonce);
                self.session.advance(AuthState::ChallengeReceived, now);

                let signature = self.signer.sign(&nonce);
                self.session.advance(AuthState::ResponseSent, now);

                Ok(vec![self.send(Message::Response { nonce, signature })])
            },

            (AuthState::ResponseSent, Message::AuthSuccess) => {
                self.session.advance(AuthState::Authenticated, now);
                tracing::info!(peer = ?self.authenticator, identity = %self.identity, "authenticated");

                Ok(vec![HandshakeAction::Authenticated {
                    peer: self.authenticator.clone(),
                    identity: self.identity.clone(),
                }])
            },

            (AuthState::RequestSent | AuthState::ResponseSent, Message::AuthFailure { reason }) => {
                self.session.reject(reason, now);
                tracing::warn!(peer = ?self.authenticator, %reason, "authentication rejected");

                Ok(vec![HandshakeAction::Rejected { peer: self.authenticator.clone(), reason }])
            },

            (state, message) => Err(ProtocolError::StaleMessage { state, tag: message.tag() }),
        }
    }

    /// Check if the live handshake has timed out
    ///
    /// Returns `Some(elapsed)` if timed out, `None` otherwise
    #[must_use]
    pub fn check_timeout(&self, now: Instant) -> Option<Duration> {
        match self.session.state() {
            AuthState::RequestSent | AuthState::ResponseSent => {
                self.session.check_timeout(now, self.config.handshake_timeout)
            },
            _ => None,
        }
    }

    /// Tick the state machine: reject locally on timeout.
    ///
    /// A timeout produces a `Rejected { reason: Timeout }` action and no
    /// message; the authenticator expires its side independently.
    pub fn tick(&mut self, now: Instant) -> Vec<HandshakeAction<P>> {
        let Some(elapsed) = self.check_timeout(now) else {
            return Vec::new();
        };

        self.session.reject(AuthFailureReason::Timeout, now);
        tracing::warn!(peer = ?self.authenticator, ?elapsed, "handshake timed out");

        vec![HandshakeAction::Rejected {
            peer: self.authenticator.clone(),
            reason: AuthFailureReason::Timeout,
        }]
    }

    fn send(&self, message: Message) -> HandshakeAction<P> {
        HandshakeAction::Send { peer: self.authenticator.clone(), message }
    }
}
