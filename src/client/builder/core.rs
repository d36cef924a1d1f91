//! Core ALPINE client builder type.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use crate::{
    client::{
        SocketOptions,
        hooks::{BeforeSendHook, LifecycleHooks},
        tracing_config::TracingConfig,
    },
    control::ReliableControlChannel,
    handshake::{ChallengeAuthenticator, StaticKeyAuthenticator},
    keepalive::DEFAULT_KEEPALIVE_INTERVAL,
    message::{CapabilitySet, DeviceIdentity},
    transport::{DEFAULT_MAX_DATAGRAM_SIZE, UdpPacketTransport},
};

/// Default wait for each handshake reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);
/// Highest supported frame rate for [`AlpineClientBuilder::frame_rate`].
pub const MAX_FRAME_RATE: usize = 10_000;

/// Builder for [`AlpineClient`](crate::client::AlpineClient).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use alpine_sdk::client::AlpineClientBuilder;
///
/// let builder = AlpineClientBuilder::new()
///     .handshake_timeout(Duration::from_secs(1))
///     .frame_rate(44);
/// let _ = builder;
/// ```
pub struct AlpineClientBuilder {
    pub(crate) local_addr: SocketAddr,
    pub(crate) identity: DeviceIdentity,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) authenticator: Arc<dyn ChallengeAuthenticator>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) keepalive_interval: Duration,
    pub(crate) max_datagram_size: usize,
    pub(crate) socket_options: SocketOptions,
    pub(crate) frame_rate: Option<usize>,
    pub(crate) control_attempts: u32,
    pub(crate) control_timeout: Duration,
    pub(crate) lifecycle_hooks: LifecycleHooks,
    pub(crate) before_send: Vec<BeforeSendHook>,
    pub(crate) tracing_config: TracingConfig,
}

impl AlpineClientBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            local_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            identity: DeviceIdentity::generate("alpine", "controller"),
            capabilities: CapabilitySet::default(),
            authenticator: Arc::new(StaticKeyAuthenticator::default()),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            socket_options: SocketOptions::default(),
            frame_rate: None,
            control_attempts: ReliableControlChannel::<UdpPacketTransport>::DEFAULT_MAX_ATTEMPTS,
            control_timeout: ReliableControlChannel::<UdpPacketTransport>::DEFAULT_BASE_TIMEOUT,
            lifecycle_hooks: LifecycleHooks::default(),
            before_send: Vec::new(),
            tracing_config: TracingConfig::default(),
        }
    }
}

impl Default for AlpineClientBuilder {
    fn default() -> Self { Self::new() }
}
