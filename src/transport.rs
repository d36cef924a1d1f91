//! Packet transports for the handshake and control plane.
//!
//! [`PacketTransport`] moves whole [`Packet`]s between two peers. The UDP
//! implementation encodes one packet per datagram; [`TimeoutTransport`] adds a
//! per-receive deadline and [`PipeTransport`] connects two in-process peers.

use std::{error::Error, io, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{net::UdpSocket, sync::mpsc, time};

use crate::{
    message::Packet,
    serializer::{BincodeSerializer, Serializer},
};

/// Default upper bound on a single datagram.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 2048;

/// Errors raised while moving packets.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket failure.
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    /// Failed to encode an outbound packet.
    #[error("failed to encode packet")]
    Encode(#[source] Box<dyn Error + Send + Sync>),
    /// Failed to decode an inbound datagram.
    #[error("failed to decode packet")]
    Decode(#[source] Box<dyn Error + Send + Sync>),
    /// Encoded packet exceeds the datagram limit.
    #[error("packet of {len} bytes exceeds datagram limit of {max} bytes")]
    Oversized { len: usize, max: usize },
    /// No packet arrived before the deadline.
    #[error("recv timeout")]
    Timeout,
    /// The peer side of an in-memory transport went away.
    #[error("transport closed")]
    Closed,
}

/// Bidirectional packet exchange with a single peer.
#[async_trait]
pub trait PacketTransport: Send {
    /// Send one packet to the peer.
    async fn send(&mut self, packet: Packet) -> Result<(), TransportError>;

    /// Receive the next packet from the peer.
    async fn recv(&mut self) -> Result<Packet, TransportError>;
}

/// Bincode-over-UDP transport bound to one peer address.
///
/// The socket is shared so that frames and control packets can leave through
/// the same local port. Datagrams from other addresses are skipped.
#[derive(Debug)]
pub struct UdpPacketTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    max_datagram_size: usize,
    serializer: BincodeSerializer,
}

impl UdpPacketTransport {
    /// Bind a fresh socket on `local` talking to `peer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(local: SocketAddr, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self::from_socket(Arc::new(socket), peer))
    }

    /// Wrap an existing socket.
    #[must_use]
    pub fn from_socket(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self {
            socket,
            peer,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            serializer: BincodeSerializer,
        }
    }

    /// Set the largest datagram sent or accepted.
    #[must_use]
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }
}

#[async_trait]
impl PacketTransport for UdpPacketTransport {
    async fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
        let bytes = self
            .serializer
            .serialize(&packet)
            .map_err(TransportError::Encode)?;
        if bytes.len() > self.max_datagram_size {
            return Err(TransportError::Oversized {
                len: bytes.len(),
                max: self.max_datagram_size,
            });
        }
        self.socket.send_to(&bytes, self.peer).await?;
        tracing::trace!(kind = packet.kind(), bytes = bytes.len(), peer = %self.peer, "packet sent");
        Ok(())
    }

    async fn recv(&mut self) -> Result<Packet, TransportError> {
        let mut buf = vec![0u8; self.max_datagram_size];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            if from != self.peer {
                tracing::trace!(%from, "ignoring datagram from unexpected peer");
                continue;
            }
            let (packet, _) = self
                .serializer
                .deserialize::<Packet>(&buf[..len])
                .map_err(TransportError::Decode)?;
            return Ok(packet);
        }
    }
}

/// Wrapper that enforces a deadline on every receive.
#[derive(Debug)]
pub struct TimeoutTransport<T> {
    inner: T,
    recv_timeout: Duration,
}

impl<T> TimeoutTransport<T> {
    /// Wrap `inner`, failing receives that exceed `recv_timeout`.
    pub fn new(inner: T, recv_timeout: Duration) -> Self {
        Self {
            inner,
            recv_timeout,
        }
    }

    /// Configured receive deadline.
    pub const fn recv_timeout(&self) -> Duration { self.recv_timeout }

    /// Unwrap the inner transport.
    pub fn into_inner(self) -> T { self.inner }
}

#[async_trait]
impl<T> PacketTransport for TimeoutTransport<T>
where
    T: PacketTransport,
{
    async fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.inner.send(packet).await
    }

    async fn recv(&mut self) -> Result<Packet, TransportError> {
        time::timeout(self.recv_timeout, self.inner.recv())
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }
}

/// In-memory transport connecting two peers in the same process.
///
/// # Examples
///
/// ```
/// use alpine_sdk::{PacketTransport, PipeTransport, message::{Close, Packet}};
/// use uuid::Uuid;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), alpine_sdk::TransportError> {
/// let (mut left, mut right) = PipeTransport::pair();
/// let packet = Packet::Close(Close { session_id: Uuid::nil() });
/// left.send(packet.clone()).await?;
/// assert_eq!(right.recv().await?, packet);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PipeTransport {
    sender: mpsc::Sender<Packet>,
    receiver: mpsc::Receiver<Packet>,
}

impl PipeTransport {
    const CAPACITY: usize = 16;

    /// Create two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(Self::CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(Self::CAPACITY);
        (
            Self {
                sender: a_tx,
                receiver: b_rx,
            },
            Self {
                sender: b_tx,
                receiver: a_rx,
            },
        )
    }
}

#[async_trait]
impl PacketTransport for PipeTransport {
    async fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.sender
            .send(packet)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<Packet, TransportError> {
        self.receiver.recv().await.ok_or(TransportError::Closed)
    }
}
