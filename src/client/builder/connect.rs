//! Session establishment for `AlpineClientBuilder`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use leaky_bucket::RateLimiter;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::AlpineClientBuilder;
use crate::{
    client::{
        AlpineClient,
        ClientError,
        tracing_helpers::{connect_span, emit_timing_event, start_timer},
    },
    control::{ControlClient, ReliableControlChannel},
    handshake::{ClientHandshake, HandshakeContext},
    keepalive::spawn_keepalive,
    session::AlnpSession,
    transport::{TimeoutTransport, UdpPacketTransport},
};

impl AlpineClientBuilder {
    /// Perform the handshake with the device at `remote` and return a
    /// connected client.
    ///
    /// The client binds its own socket, authenticates the device, starts the
    /// keepalive task and invokes the setup hook. Frames cannot be sent until
    /// [`AlpineClient::start_stream`] binds a profile.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the socket cannot be set up and
    /// [`ClientError::Handshake`] if the device cannot be authenticated in
    /// time.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::net::SocketAddr;
    ///
    /// use alpine_sdk::{AlpineClient, ClientError};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), ClientError> {
    /// let addr: SocketAddr = "192.0.2.10:5555".parse().expect("valid socket address");
    /// let _client = AlpineClient::builder().connect(addr).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(self, remote: SocketAddr) -> Result<AlpineClient, ClientError> {
        let span = connect_span(&self.tracing_config, remote);
        let timer = start_timer(self.tracing_config.connect_timing);
        let on_error = self.lifecycle_hooks.on_error.clone();
        let result = self.establish(remote).instrument(span.clone()).await;
        match result {
            Ok(client) => {
                span.record("session_id", tracing::field::display(client.control.session_id()));
                span.in_scope(|| emit_timing_event(timer));
                Ok(client)
            }
            Err(err) => {
                span.in_scope(|| tracing::warn!(error = %err, "connect failed"));
                if let Some(handler) = on_error {
                    handler(&err).await;
                }
                Err(err)
            }
        }
    }

    async fn establish(self, remote: SocketAddr) -> Result<AlpineClient, ClientError> {
        let socket = Arc::new(self.socket_options.bind(self.local_addr)?);
        let local_addr = socket.local_addr()?;
        let udp = UdpPacketTransport::from_socket(Arc::clone(&socket), remote)
            .with_max_datagram_size(self.max_datagram_size);
        let mut transport = TimeoutTransport::new(udp, self.handshake_timeout);

        let handshake = ClientHandshake {
            identity: self.identity,
            capabilities: self.capabilities,
            authenticator: self.authenticator,
            context: HandshakeContext::default(),
        };
        let session = AlnpSession::connect(&handshake, &mut transport).await?;
        let established = session.established().ok_or(ClientError::SessionMissing)?;
        tracing::info!(
            %local_addr,
            session_id = %established.session_id,
            device = %established.device_identity.device_id,
            "session established"
        );

        let keepalive_transport = UdpPacketTransport::from_socket(Arc::clone(&socket), remote)
            .with_max_datagram_size(self.max_datagram_size);
        let channel = Arc::new(Mutex::new(
            ReliableControlChannel::new(transport.into_inner())
                .with_max_attempts(self.control_attempts)
                .with_base_timeout(self.control_timeout),
        ));
        let shutdown = CancellationToken::new();
        let keepalive = spawn_keepalive(
            keepalive_transport,
            self.keepalive_interval,
            session.clone(),
            established.session_id,
            shutdown.clone(),
        );
        let control = ControlClient::new(
            established.device_identity.device_id.clone(),
            established.session_id,
        );

        if let Some(ref setup) = self.lifecycle_hooks.on_connect {
            setup(established).await;
        }

        Ok(AlpineClient {
            socket,
            local_addr,
            remote_addr: remote,
            session,
            control,
            channel,
            stream: None,
            limiter: self.frame_rate.map(build_limiter),
            max_datagram_size: self.max_datagram_size,
            before_send: self.before_send,
            lifecycle_hooks: self.lifecycle_hooks,
            tracing_config: self.tracing_config,
            shutdown,
            keepalive: Some(keepalive),
        })
    }
}

fn build_limiter(rate: usize) -> RateLimiter {
    RateLimiter::builder()
        .initial(rate)
        .refill(rate)
        .interval(Duration::from_secs(1))
        .max(rate)
        .build()
}
