//! Connection settings for `AlpineClientBuilder`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use super::{AlpineClientBuilder, MAX_FRAME_RATE};
use crate::{
    client::{SocketOptions, config::clamp_datagram_size},
    handshake::ChallengeAuthenticator,
    message::{CapabilitySet, DeviceIdentity},
};

impl AlpineClientBuilder {
    /// Local address to bind. Defaults to `0.0.0.0:0`.
    #[must_use]
    pub fn local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = addr;
        self
    }

    /// Identity presented to devices in `Hello`.
    #[must_use]
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Capabilities offered during the handshake.
    #[must_use]
    pub fn capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Credential used to sign and verify handshake nonces.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use alpine_sdk::{StaticKeyAuthenticator, client::AlpineClientBuilder};
    ///
    /// let builder = AlpineClientBuilder::new()
    ///     .authenticator(Arc::new(StaticKeyAuthenticator::new(b"rig-7".to_vec())));
    /// let _ = builder;
    /// ```
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn ChallengeAuthenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    /// Wait for each handshake reply. Defaults to three seconds.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Interval between keepalives. Defaults to five seconds.
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Largest datagram sent or accepted, clamped to 256 bytes..=64 KiB.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::client::AlpineClientBuilder;
    ///
    /// let builder = AlpineClientBuilder::new().max_datagram_size(1);
    /// assert_eq!(builder.max_datagram_size_value(), 256);
    /// ```
    #[must_use]
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = clamp_datagram_size(size);
        self
    }

    /// Configured datagram limit.
    #[must_use]
    pub const fn max_datagram_size_value(&self) -> usize { self.max_datagram_size }

    /// Replace the socket options applied before binding.
    #[must_use]
    pub fn socket_options(mut self, socket_options: SocketOptions) -> Self {
        self.socket_options = socket_options;
        self
    }

    /// Cap outgoing frames per second, clamped to `1..=MAX_FRAME_RATE`.
    #[must_use]
    pub fn frame_rate(mut self, frames_per_second: usize) -> Self {
        self.frame_rate = Some(frames_per_second.clamp(1, MAX_FRAME_RATE));
        self
    }

    /// Configured frame rate limit, if any.
    #[must_use]
    pub const fn frame_rate_value(&self) -> Option<usize> { self.frame_rate }

    /// Transmissions of a control request before giving up.
    #[must_use]
    pub fn control_attempts(mut self, attempts: u32) -> Self {
        self.control_attempts = attempts.max(1);
        self
    }

    /// Wait for the first control acknowledgement; later attempts double it.
    #[must_use]
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }
}
