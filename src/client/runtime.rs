//! ALPINE client runtime implementation.

use std::{fmt, net::SocketAddr, sync::Arc};

use leaky_bucket::RateLimiter;
use tokio::{net::UdpSocket, sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::{
    AlpineClientBuilder,
    ClientError,
    ConnectOptions,
    hooks::{BeforeSendHook, LifecycleHooks},
    tracing_config::TracingConfig,
    tracing_helpers::{
        close_span,
        control_span,
        emit_timing_event,
        send_frame_span,
        start_stream_span,
        start_timer,
    },
};
use crate::{
    control::{ControlClient, ControlError, ReliableControlChannel},
    message::{Acknowledge, Close, ControlEnvelope, ControlOp, Frame, Packet},
    metrics::{self, Direction},
    profile::StreamProfile,
    session::AlnpSession,
    stream::{AdaptationState, AlnpStream, NetworkConditions, RecoveryEvent, UdpFrameTransport},
    transport::{PacketTransport, UdpPacketTransport},
};

/// Controller connected to a single ALPINE device.
///
/// A client owns one UDP socket. Control requests go through a
/// [`ReliableControlChannel`], keepalives leave from their own task and frames
/// leave through an
/// [`AlnpStream`] once [`start_stream`](Self::start_stream) has bound a
/// profile. Dropping the client stops the keepalive task without notifying
/// the device; call [`close`](Self::close) for an orderly shutdown.
///
/// # Examples
///
/// ```no_run
/// use std::net::SocketAddr;
///
/// use alpine_sdk::{AlpineClient, ChannelFormat, ClientError, Frame, StreamProfile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ClientError> {
/// let addr: SocketAddr = "192.0.2.10:5555".parse().expect("valid socket address");
/// let mut client = AlpineClient::builder().connect(addr).await?;
/// client.start_stream(StreamProfile::realtime())?;
/// client
///     .send_frame(Frame::new(ChannelFormat::U8, vec![255, 0, 128]))
///     .await?;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct AlpineClient {
    pub(crate) socket: Arc<UdpSocket>,
    pub(crate) local_addr: SocketAddr,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) session: AlnpSession,
    pub(crate) control: ControlClient,
    pub(crate) channel: Arc<Mutex<ReliableControlChannel<UdpPacketTransport>>>,
    pub(crate) stream: Option<AlnpStream<UdpFrameTransport>>,
    pub(crate) limiter: Option<RateLimiter>,
    pub(crate) max_datagram_size: usize,
    pub(crate) before_send: Vec<BeforeSendHook>,
    pub(crate) lifecycle_hooks: LifecycleHooks,
    pub(crate) tracing_config: TracingConfig,
    pub(crate) shutdown: CancellationToken,
    pub(crate) keepalive: Option<JoinHandle<()>>,
}

impl fmt::Debug for AlpineClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlpineClient")
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("device_id", &self.control.device_id())
            .field("session_id", &self.control.session_id())
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl AlpineClient {
    /// Start building a new client.
    #[must_use]
    pub fn builder() -> AlpineClientBuilder { AlpineClientBuilder::new() }

    /// Connect using plain [`ConnectOptions`].
    ///
    /// # Errors
    ///
    /// Returns any error raised by [`AlpineClientBuilder::connect`].
    pub async fn connect(options: ConnectOptions) -> Result<Self, ClientError> {
        let remote = options.remote_addr;
        options.into_builder().connect(remote).await
    }

    /// Compile `profile`, bind it to the session and open the frame stream.
    ///
    /// Returns the profile's `config_id`. The profile is locked once the
    /// stream starts, so a second call fails.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Profile`] for an invalid profile and
    /// [`ClientError::Handshake`] if the session is not ready or refuses the
    /// profile. A refused start leaves no profile bound.
    pub fn start_stream(&mut self, profile: StreamProfile) -> Result<String, ClientError> {
        let span = start_stream_span(&self.tracing_config, profile.intent().as_str());
        let _entered = span.enter();
        let timer = start_timer(self.tracing_config.start_stream_timing);

        let compiled = profile.compile()?;
        self.session.ensure_streaming_ready()?;
        self.session.set_stream_profile(compiled.clone())?;
        self.session.mark_streaming();

        let config_id = compiled.config_id().to_string();
        let transport = UdpFrameTransport::new(Arc::clone(&self.socket), self.remote_addr);
        self.stream = Some(
            AlnpStream::new(self.session.clone(), transport, compiled)
                .with_max_datagram_size(self.max_datagram_size)
                .with_before_send(self.before_send.clone()),
        );
        span.record("config_id", config_id.as_str());
        tracing::debug!("stream started");
        emit_timing_event(timer);
        Ok(config_id)
    }

    /// Send one frame on the stream.
    ///
    /// Waits on the frame-rate limiter when one is configured. If an error
    /// hook is registered, it is invoked before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::StreamNotStarted`] before
    /// [`start_stream`](Self::start_stream) and [`ClientError::Stream`] if the
    /// frame cannot be sent.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ClientError> {
        let span = send_frame_span(&self.tracing_config, frame.channels.len());
        let timer = start_timer(self.tracing_config.send_frame_timing);
        async move {
            let Some(stream) = &self.stream else {
                let err = ClientError::StreamNotStarted;
                self.invoke_error_hook(&err).await;
                return Err(err);
            };
            if let Some(ref limiter) = self.limiter {
                limiter.acquire(1).await;
            }
            match stream.send(frame).await {
                Ok(sequence) => {
                    Span::current().record("sequence", sequence);
                    metrics::inc_frames(Direction::Outbound);
                    emit_timing_event(timer);
                    Ok(())
                }
                Err(err) => {
                    metrics::inc_errors();
                    let err = ClientError::from(err);
                    self.invoke_error_hook(&err).await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Send a control request and wait for the device's acknowledgement.
    ///
    /// A negative acknowledgement is returned as `Ok` with `ok == false`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Control`] if the request is never acknowledged.
    pub async fn control(&self, op: ControlOp, payload: Vec<u8>) -> Result<Acknowledge, ClientError> {
        let span = control_span(&self.tracing_config, op.as_str());
        let timer = start_timer(self.tracing_config.control_timing);
        async move {
            let result = {
                let mut channel = self.channel.lock().await;
                self.control.send(&mut *channel, op, payload).await
            };
            match result {
                Ok(ack) => {
                    Span::current().record("result", if ack.ok { "ack" } else { "nack" });
                    emit_timing_event(timer);
                    Ok(ack)
                }
                Err(err) => {
                    Span::current().record("result", "error");
                    if matches!(err, ControlError::RetransmitLimit { .. }) {
                        metrics::inc_control_failures();
                    }
                    metrics::inc_errors();
                    let err = ClientError::from(err);
                    self.invoke_error_hook(&err).await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Build a control envelope for this session without sending it.
    #[must_use]
    pub fn control_envelope(&self, seq: u64, op: ControlOp, payload: Vec<u8>) -> ControlEnvelope {
        self.control.envelope(seq, op, payload)
    }

    /// Feed receiver-side conditions into the stream's recovery monitor and
    /// adaptation state.
    ///
    /// Returns `None` before [`start_stream`](Self::start_stream).
    pub fn observe_network_conditions(&self, conditions: &NetworkConditions) -> Option<RecoveryEvent> {
        self.stream
            .as_ref()
            .and_then(|stream| stream.observe_network_conditions(conditions))
    }

    /// Adaptation state of the stream, once started.
    #[must_use]
    pub fn adaptation(&self) -> Option<AdaptationState> {
        self.stream.as_ref().map(AlnpStream::adaptation)
    }

    /// Shared handle to the session.
    #[must_use]
    pub fn session(&self) -> &AlnpSession { &self.session }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr { self.local_addr }

    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// `config_id` of the bound profile, if a stream was started.
    #[must_use]
    pub fn config_id(&self) -> Option<String> { self.session.profile_config_id() }

    /// Stop keepalives, tell the device the session is over and close it.
    ///
    /// Failure to reach the device is logged and otherwise ignored. The
    /// teardown hook runs with the closed session id.
    pub async fn close(mut self) {
        let span = close_span(&self.tracing_config);
        let timer = start_timer(self.tracing_config.close_timing);
        async {
            self.shutdown.cancel();
            if let Some(handle) = self.keepalive.take() {
                if let Err(err) = handle.await {
                    tracing::debug!(error = %err, "keepalive task ended abnormally");
                }
            }

            let session_id = self.control.session_id();
            let sent = self
                .channel
                .lock()
                .await
                .send(Packet::Close(Close { session_id }))
                .await;
            if let Err(err) = sent {
                tracing::debug!(error = %err, "failed to notify device of close");
            }
            self.session.close();

            if let Some(ref handler) = self.lifecycle_hooks.on_disconnect {
                handler(session_id).await;
            }
            emit_timing_event(timer);
        }
        .instrument(span)
        .await;
    }

    async fn invoke_error_hook(&self, error: &ClientError) {
        if let Some(ref handler) = self.lifecycle_hooks.on_error {
            handler(error).await;
        }
    }
}

impl Drop for AlpineClient {
    fn drop(&mut self) { self.shutdown.cancel(); }
}
