//! Routing of transport events to a handshake endpoint.
//!
//! The [`Dispatcher`] is the only place where bytes turn into messages and
//! back. One inbound [`TransportEvent`] is processed synchronously into a
//! list of [`DispatchAction`]s:
//!
//! ```text
//! TransportEvent::Frame ──decode──> Endpoint::on_message ──encode──> DispatchAction::Send
//!        │                   │
//!        │                   └─DecodeError─> dropped (warn)
//!        │
//! TransportEvent::Error ─────────────────────────────────> DispatchAction::TransportError
//! ```
//!
//! Transport errors never reach the state machine.

use std::{fmt, hash::Hash, sync::Arc, time::Instant};

use bytes::Bytes;
use droneauth_proto::{AuthFailureReason, IdentityToken, Message};

use crate::{
    action::HandshakeAction,
    authenticator::Authenticator,
    capability::{SignatureVerifier, Signer},
    client::ClientHandshake,
    env::Environment,
    error::ProtocolError,
    transport::{TransportError, TransportEvent},
};

/// A handshake role that consumes decoded messages.
pub trait Endpoint<P> {
    /// Handle one message from `from`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] when the message was ignored.
    fn on_message(
        &mut self,
        from: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError>;
}

impl<S, P> Endpoint<P> for ClientHandshake<S, P>
where
    S: Signer,
    P: Clone + Eq + fmt::Debug,
{
    fn on_message(
        &mut self,
        from: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        self.handle_message(from, message, now)
    }
}

impl<E, V, P> Endpoint<P> for Authenticator<E, V, P>
where
    E: Environment,
    V: SignatureVerifier,
    P: Clone + Eq + Hash + fmt::Debug,
{
    fn on_message(
        &mut self,
        from: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        self.handle_message(from, message, now)
    }
}

impl<E, V, P> Endpoint<P> for Arc<Authenticator<E, V, P>>
where
    E: Environment,
    V: SignatureVerifier,
    P: Clone + Eq + Hash + fmt::Debug,
{
    fn on_message(
        &mut self,
        from: &P,
        message: Message,
        now: Instant,
    ) -> Result<Vec<HandshakeAction<P>>, ProtocolError> {
        self.handle_message(from, message, now)
    }
}

/// What the driver must do after a dispatch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction<P> {
    /// Hand these encoded bytes to the transport
    Send {
        /// Destination
        peer: P,
        /// Encoded frame
        bytes: Bytes,
    },

    /// A handshake completed successfully
    Authenticated {
        /// Peer on the other side
        peer: P,
        /// Proven identity
        identity: IdentityToken,
    },

    /// A handshake failed
    Rejected {
        /// Peer on the other side
        peer: P,
        /// Why it failed
        reason: AuthFailureReason,
    },

    /// The transport reported a failure
    TransportError {
        /// Peer the failure relates to, if known
        peer: Option<P>,
        /// The failure
        error: TransportError,
    },
}

/// Counters kept by a [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames received
    pub frames: u64,
    /// Frames dropped because they did not decode
    pub decode_failures: u64,
    /// Decoded messages ignored by the endpoint
    pub absorbed: u64,
    /// Transport error events received
    pub transport_errors: u64,
    /// Frames encoded for sending
    pub sent: u64,
}

/// Decodes inbound frames, drives an [`Endpoint`], encodes its sends.
pub struct Dispatcher<H> {
    endpoint: H,
    stats: DispatchStats,
}

impl<H> Dispatcher<H> {
    /// Wrap `endpoint`
    pub fn new(endpoint: H) -> Self {
        Self { endpoint, stats: DispatchStats::default() }
    }

    /// The wrapped endpoint
    pub fn endpoint(&self) -> &H {
        &self.endpoint
    }

    /// The wrapped endpoint, mutably (e.g. to `start` or `tick` a client)
    pub fn endpoint_mut(&mut self) -> &mut H {
        &mut self.endpoint
    }

    /// Unwrap the endpoint
    pub fn into_inner(self) -> H {
        self.endpoint
    }

    /// Counters so far
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Process one transport event.
    pub fn dispatch<P>(&mut self, event: TransportEvent<P>, now: Instant) -> Vec<DispatchAction<P>>
    where
        H: Endpoint<P>,
        P: Clone + fmt::Debug,
    {
        match event {
            TransportEvent::Frame { peer, bytes } => {
                self.stats.frames += 1;

                let message = match Message::decode(&bytes) {
                    Ok(message) => message,
                    Err(err) => {
                        self.stats.decode_failures += 1;
                        tracing::warn!(?peer, len = bytes.len(), error = %err, "dropping undecodable frame");
                        return Vec::new();
                    },
                };

                let tag = message.tag();
                match self.endpoint.on_message(&peer, message, now) {
                    Ok(actions) => self.execute(actions),
                    Err(err) => {
                        self.stats.absorbed += 1;
                        tracing::debug!(?peer, ?tag, error = %err, "ignoring message");
                        Vec::new()
                    },
                }
            },

            TransportEvent::Error { peer, error } => {
                self.stats.transport_errors += 1;
                tracing::warn!(?peer, %error, "transport error");
                vec![DispatchAction::TransportError { peer, error }]
            },
        }
    }

    /// Turn state machine actions into dispatch actions, encoding sends.
    ///
    /// Drivers also feed the output of `start`, `tick`, and `sweep` through
    /// here.
    pub fn execute<P>(&mut self, actions: Vec<HandshakeAction<P>>) -> Vec<DispatchAction<P>> {
        actions
            .into_iter()
            .map(|action| match action {
                HandshakeAction::Send { peer, message } => {
                    self.stats.sent += 1;
                    DispatchAction::Send { peer, bytes: message.encode() }
                },
                HandshakeAction::Authenticated { peer, identity } => {
                    DispatchAction::Authenticated { peer, identity }
                },
                HandshakeAction::Rejected { peer, reason } => DispatchAction::Rejected { peer, reason },
            })
            .collect()
    }
}
