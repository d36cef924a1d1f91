//! Plain connection options for the [`Connect`](crate::sdk::Connect) factory.

use std::{fmt, net::SocketAddr, sync::Arc, time::Duration};

use super::{AlpineClientBuilder, builder::DEFAULT_HANDSHAKE_TIMEOUT};
use crate::{
    handshake::{ChallengeAuthenticator, StaticKeyAuthenticator},
    keepalive::DEFAULT_KEEPALIVE_INTERVAL,
    message::{CapabilitySet, DeviceIdentity},
};

/// Everything [`AlpineClient::connect`](crate::AlpineClient::connect) needs to
/// reach a device.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use alpine_sdk::ConnectOptions;
///
/// let mut options = ConnectOptions::new("192.0.2.10:5555".parse().expect("addr"));
/// options.handshake_timeout = Duration::from_secs(1);
/// assert_eq!(options.keepalive_interval, Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct ConnectOptions {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub authenticator: Arc<dyn ChallengeAuthenticator>,
    pub handshake_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl ConnectOptions {
    /// Options for `remote_addr` with every other value at its default.
    #[must_use]
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            local_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            identity: DeviceIdentity::generate("alpine", "controller"),
            capabilities: CapabilitySet::default(),
            authenticator: Arc::new(StaticKeyAuthenticator::default()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    /// Convert into a builder for further configuration.
    #[must_use]
    pub fn into_builder(self) -> AlpineClientBuilder {
        AlpineClientBuilder::new()
            .local_addr(self.local_addr)
            .identity(self.identity)
            .capabilities(self.capabilities)
            .authenticator(self.authenticator)
            .handshake_timeout(self.handshake_timeout)
            .keepalive_interval(self.keepalive_interval)
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.local_addr)
            .field("identity", &self.identity)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .finish_non_exhaustive()
    }
}
