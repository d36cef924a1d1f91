//! Socket options and datagram limits for ALPINE clients.

use std::{io, net::SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Smallest accepted datagram limit.
pub const MIN_DATAGRAM_SIZE: usize = 256;
/// Largest accepted datagram limit.
pub const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Clamp a requested datagram limit to the supported range.
pub(crate) fn clamp_datagram_size(size: usize) -> usize {
    size.clamp(MIN_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE)
}

/// Socket options applied before binding a client socket.
///
/// # Examples
///
/// ```
/// use alpine_sdk::client::SocketOptions;
///
/// let options = SocketOptions::default().broadcast(true).ttl(4);
/// let expected = SocketOptions::default().broadcast(true).ttl(4);
/// assert_eq!(options, expected);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    broadcast: Option<bool>,
    ttl: Option<u32>,
    send_buffer_size: Option<usize>,
    recv_buffer_size: Option<usize>,
    reuseaddr: Option<bool>,
    #[cfg(all(
        unix,
        not(target_os = "solaris"),
        not(target_os = "illumos"),
        not(target_os = "cygwin"),
    ))]
    reuseport: Option<bool>,
}

impl SocketOptions {
    /// Configure `SO_BROADCAST` on the socket.
    #[must_use]
    pub fn broadcast(mut self, enabled: bool) -> Self {
        self.broadcast = Some(enabled);
        self
    }

    /// Configure the IP time-to-live of outgoing datagrams.
    #[must_use]
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Configure the socket send buffer size.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::SocketOptions;
    ///
    /// let options = SocketOptions::default().send_buffer_size(1 << 16);
    /// assert_ne!(options, SocketOptions::default());
    /// ```
    #[must_use]
    pub fn send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    /// Configure the socket receive buffer size.
    #[must_use]
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Configure `SO_REUSEADDR` on the socket.
    #[must_use]
    pub fn reuseaddr(mut self, enabled: bool) -> Self {
        self.reuseaddr = Some(enabled);
        self
    }

    /// Configure `SO_REUSEPORT` on supported platforms.
    #[cfg(all(
        unix,
        not(target_os = "solaris"),
        not(target_os = "illumos"),
        not(target_os = "cygwin"),
    ))]
    #[must_use]
    pub fn reuseport(mut self, enabled: bool) -> Self {
        self.reuseport = Some(enabled);
        self
    }

    /// Create a non-blocking UDP socket on `addr` with these options applied.
    pub(crate) fn bind(&self, addr: SocketAddr) -> io::Result<UdpSocket> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        self.apply(&socket)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        UdpSocket::from_std(socket.into())
    }

    fn apply(&self, socket: &Socket) -> io::Result<()> {
        if let Some(enabled) = self.broadcast {
            socket.set_broadcast(enabled)?;
        }
        if let Some(ttl) = self.ttl {
            socket.set_ttl(ttl)?;
        }
        if let Some(size) = self.send_buffer_size {
            socket.set_send_buffer_size(size)?;
        }
        if let Some(size) = self.recv_buffer_size {
            socket.set_recv_buffer_size(size)?;
        }
        if let Some(enabled) = self.reuseaddr {
            socket.set_reuse_address(enabled)?;
        }
        self.apply_reuseport(socket)
    }

    #[cfg(all(
        unix,
        not(target_os = "solaris"),
        not(target_os = "illumos"),
        not(target_os = "cygwin"),
    ))]
    fn apply_reuseport(&self, socket: &Socket) -> io::Result<()> {
        if let Some(enabled) = self.reuseport {
            socket.set_reuse_port(enabled)?;
        }
        Ok(())
    }

    #[cfg(not(all(
        unix,
        not(target_os = "solaris"),
        not(target_os = "illumos"),
        not(target_os = "cygwin"),
    )))]
    fn apply_reuseport(&self, _socket: &Socket) -> io::Result<()> { Ok(()) }
}
