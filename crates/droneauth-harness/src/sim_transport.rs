//! Turmoil-based Transport implementation using UDP datagrams.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use droneauth_core::{Transport, TransportEvent};
use turmoil::net::UdpSocket;

/// Receive buffer size. Larger than any encoded handshake message, so a
/// truncated datagram shows up as a decode failure rather than going unseen.
const MAX_DATAGRAM: usize = 2048;

/// Simulation transport over Turmoil's UDP sockets.
///
/// - **Unreliable delivery**: Turmoil may drop, delay, or partition datagrams
/// - **Peer addressing**: the peer is the remote `SocketAddr`
/// - **Error signal**: socket failures surface as [`TransportEvent::Error`]
pub struct SimTransport {
    socket: UdpSocket,
}

impl SimTransport {
    /// Binds a UDP socket on the current simulated host.
    ///
    /// # Errors
    ///
    /// Returns error if the address is already in use.
    pub async fn bind(address: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(address).await?;
        Ok(Self { socket })
    }

    /// Local address of the socket
    ///
    /// # Errors
    ///
    /// Returns error if the socket is no longer bound.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Peer = SocketAddr;

    async fn recv(&self) -> TransportEvent<SocketAddr> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        match self.socket.recv_from(&mut buf).await {
            Ok((len, peer)) => {
                buf.truncate(len);
                TransportEvent::Frame { peer, bytes: Bytes::from(buf) }
            },
            Err(err) => TransportEvent::Error { peer: None, error: err.into() },
        }
    }

    async fn send(&self, peer: &SocketAddr, bytes: &[u8]) -> io::Result<()> {
        self.socket.send_to(bytes, *peer).await?;
        Ok(())
    }
}
