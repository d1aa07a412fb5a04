//! Transport abstraction for datagram I/O.
//!
//! The handshake runs over an unreliable message transport: frames may be
//! lost, duplicated, or reordered. The `Transport` trait models exactly that
//! and nothing more:
//!
//! - **Frames**: opaque byte sequences tagged with the sending peer
//! - **Errors**: transport-level failures delivered as a distinct signal
//!
//! # Implementations
//!
//! - **`SimTransport`** (testing): Turmoil UDP sockets with virtual time and
//!   fault injection
//! - **Production**: whatever link the drone and ground station share (UDP,
//!   radio modem, ...)
//!
//! # Event Classification
//!
//! Inbound events are an explicit [`TransportEvent`] enum. A transport error
//! is never disguised as an empty or malformed frame, so the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) can route errors to a side
//! channel by matching, not by probing the payload.

use std::{fmt, hash::Hash, io};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// One inbound event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent<P> {
    /// A frame arrived from `peer`
    Frame {
        /// Sender as identified by the transport
        peer: P,
        /// Raw frame bytes (not yet decoded)
        bytes: Bytes,
    },

    /// The transport reported a failure
    Error {
        /// Peer the failure relates to, if the transport knows it
        peer: Option<P>,
        /// What went wrong
        error: TransportError,
    },
}

/// Transport-level failures.
///
/// These never reach a handshake state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer reset the connection (e.g. ICMP port unreachable on UDP)
    #[error("connection reset by peer")]
    ConnectionReset,

    /// The peer could not be reached
    #[error("peer unreachable")]
    Unreachable,

    /// Any other I/O failure
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Convert io::Error to TransportError
impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused => {
                TransportError::ConnectionReset
            },
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                TransportError::Unreachable
            },
            _ => TransportError::Io(err.to_string()),
        }
    }
}

/// Abstract datagram transport.
///
/// # Delivery Guarantees
///
/// At most once, possibly reordered, possibly duplicated. The state machines
/// are correct under all three because messages inconsistent with the
/// current state are ignored.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Transport-level peer identifier (e.g. a socket address)
    type Peer: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Wait for the next inbound event.
    ///
    /// Failures are returned as [`TransportEvent::Error`] rather than as a
    /// `Result`, so callers handle them through the same classification path.
    async fn recv(&self) -> TransportEvent<Self::Peer>;

    /// Send an encoded frame to `peer`.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` if the frame could not be handed to the
    /// network. Success does not imply delivery.
    async fn send(&self, peer: &Self::Peer, bytes: &[u8]) -> io::Result<()>;
}
