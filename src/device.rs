//! Device-side UDP server.
//!
//! [`DeviceServer`] answers discovery requests, runs the device half of the
//! handshake for each controller, acknowledges control requests and forwards
//! received frames to the application through a channel. A single task owns
//! the socket; per-controller state lives in a [`SessionRegistry`].

use std::{
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use dashmap::DashMap;
use tokio::{net::UdpSocket, sync::mpsc, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    control::ControlError,
    discovery::DiscoveryResponder,
    handshake::{
        ChallengeAuthenticator,
        HandshakeContext,
        PendingHandshake,
        ServerHandshake,
        StaticKeyAuthenticator,
    },
    message::{
        CapabilitySet,
        ChallengeResponse,
        ControlEnvelope,
        DeviceIdentity,
        ErrorCode,
        ErrorMessage,
        FrameEnvelope,
        Hello,
        Packet,
    },
    metrics,
    registry::{PeerSession, SessionRegistry},
    serializer::{BincodeSerializer, Serializer},
    session::{AlnpRole, AlnpSession, DEFAULT_SESSION_TIMEOUT},
    stream::NetworkMetrics,
    transport::{DEFAULT_MAX_DATAGRAM_SIZE, TransportError},
};

/// Application callback for control requests.
///
/// `Ok(detail)` acknowledges the request; `Err(detail)` sends a negative
/// acknowledgement.
pub type ControlHandler =
    Arc<dyn Fn(&ControlEnvelope) -> Result<Option<String>, String> + Send + Sync>;

/// Errors raised while replying to a controller.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Socket failure.
    #[error("device io error: {0}")]
    Io(#[from] io::Error),
    /// A reply could not be encoded or sent.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A frame delivered to the application.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedFrame {
    pub peer: SocketAddr,
    pub envelope: FrameEnvelope,
    /// Network conditions of the session after this frame.
    pub network: NetworkMetrics,
}

/// UDP server implementing the device side of ALPINE.
pub struct DeviceServer {
    socket: Arc<UdpSocket>,
    handshake: ServerHandshake,
    discovery: DiscoveryResponder,
    control_handler: Option<ControlHandler>,
    sessions: Arc<SessionRegistry>,
    pending: DashMap<SocketAddr, (AlnpSession, PendingHandshake)>,
    serializer: BincodeSerializer,
    max_datagram_size: usize,
    session_timeout: Duration,
    frame_deadline: Duration,
}

impl DeviceServer {
    /// Default allowance between a frame's timestamp and its arrival.
    pub const DEFAULT_FRAME_DEADLINE: Duration = Duration::from_millis(100);
    /// Pause after the first failed receive.
    pub const INITIAL_RECV_BACKOFF: Duration = Duration::from_millis(10);
    /// Longest pause between failed receives.
    pub const MAX_RECV_BACKOFF: Duration = Duration::from_secs(1);

    /// Bind a device on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        identity: DeviceIdentity,
        capabilities: CapabilitySet,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self::from_socket(socket, identity, capabilities))
    }

    /// Serve on an already bound `socket`.
    #[must_use]
    pub fn from_socket(socket: UdpSocket, identity: DeviceIdentity, capabilities: CapabilitySet) -> Self {
        let authenticator: Arc<dyn ChallengeAuthenticator> =
            Arc::new(StaticKeyAuthenticator::default());
        Self {
            socket: Arc::new(socket),
            discovery: DiscoveryResponder::new(identity.clone(), capabilities.clone())
                .with_signer(authenticator.clone()),
            handshake: ServerHandshake {
                identity,
                capabilities,
                authenticator,
                context: HandshakeContext::default(),
            },
            control_handler: None,
            sessions: Arc::new(SessionRegistry::default()),
            pending: DashMap::new(),
            serializer: BincodeSerializer,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            frame_deadline: Self::DEFAULT_FRAME_DEADLINE,
        }
    }

    /// Authenticate controllers and sign discovery replies with `authenticator`.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn ChallengeAuthenticator>) -> Self {
        self.discovery = self.discovery.with_signer(authenticator.clone());
        self.handshake.authenticator = authenticator;
        self
    }

    /// Handle control requests with `handler`. Without one every request is
    /// acknowledged.
    #[must_use]
    pub fn with_control_handler(mut self, handler: ControlHandler) -> Self {
        self.control_handler = Some(handler);
        self
    }

    /// Expire sessions silent for longer than `timeout`.
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Count frames arriving later than `deadline` after their timestamp as late.
    #[must_use]
    pub fn with_frame_deadline(mut self, deadline: Duration) -> Self {
        self.frame_deadline = deadline;
        self
    }

    /// Address the device listens on.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.socket.local_addr() }

    /// Shared view of the established sessions.
    #[must_use]
    pub fn sessions(&self) -> Arc<SessionRegistry> { Arc::clone(&self.sessions) }

    /// Serve until `shutdown` fires or the frame receiver is dropped.
    ///
    /// A failed receive is logged and retried after a backoff that doubles up
    /// to [`MAX_RECV_BACKOFF`](Self::MAX_RECV_BACKOFF); it never stops the
    /// server.
    pub async fn serve(self, frames: mpsc::Sender<ReceivedFrame>, shutdown: CancellationToken) {
        let mut buf = vec![0u8; self.max_datagram_size];
        let mut backoff = Self::INITIAL_RECV_BACKOFF;
        let mut maintenance = time::interval(self.session_timeout.max(Duration::from_millis(100)) / 2);
        maintenance.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        tracing::info!(addr = ?self.socket.local_addr().ok(), "device serving");

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                _ = maintenance.tick() => self.expire_sessions(),
                received = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match received {
                        Ok(received) => {
                            backoff = Self::INITIAL_RECV_BACKOFF;
                            received
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "device receive failed");
                            metrics::inc_errors();
                            time::sleep(backoff).await;
                            backoff = (backoff * 2).min(Self::MAX_RECV_BACKOFF);
                            continue;
                        }
                    };
                    let packet = match self.serializer.deserialize::<Packet>(&buf[..len]) {
                        Ok((packet, _)) => packet,
                        Err(err) => {
                            tracing::debug!(%peer, error = %err, "dropping undecodable datagram");
                            metrics::inc_errors();
                            continue;
                        }
                    };
                    if !self.dispatch(peer, packet, &frames).await {
                        break;
                    }
                }
            }
        }

        tracing::info!(sessions = self.sessions.len(), "device stopped");
    }

    /// Handle one packet. Returns `false` once frames can no longer be delivered.
    async fn dispatch(
        &self,
        peer: SocketAddr,
        packet: Packet,
        frames: &mpsc::Sender<ReceivedFrame>,
    ) -> bool {
        let reply = match packet {
            Packet::DiscoverRequest(request) => match self.discovery.reply(&request) {
                Ok(reply) => Some(Packet::DiscoverReply(reply)),
                Err(err) => Some(error_packet(ErrorCode::UnsupportedVersion, err)),
            },
            Packet::Hello(hello) => Some(self.on_hello(peer, &hello)),
            Packet::ChallengeResponse(response) => Some(self.on_response(peer, &response)),
            Packet::Keepalive(keepalive) => self.with_session(peer, keepalive.session_id, |entry| {
                entry.session().update_keepalive();
                None
            }),
            Packet::Control(envelope) => self.on_control(peer, &envelope),
            Packet::Frame(envelope) => {
                return match self.on_frame(peer, envelope) {
                    Some(frame) => frames.send(frame).await.is_ok(),
                    None => true,
                };
            }
            Packet::Close(close) => {
                let owned = self
                    .sessions
                    .get(&peer)
                    .filter(|entry| entry.session_id() == close.session_id);
                if let Some(entry) = owned {
                    entry.session().close();
                    self.sessions.remove(&peer);
                    metrics::dec_sessions();
                    tracing::info!(%peer, session_id = %close.session_id, "session closed by controller");
                }
                None
            }
            other => {
                tracing::trace!(%peer, kind = other.kind(), "ignoring packet");
                None
            }
        };

        if let Some(packet) = reply {
            if let Err(err) = self.send(peer, &packet).await {
                tracing::warn!(%peer, kind = packet.kind(), error = %err, "failed to reply");
            }
        }
        true
    }

    fn on_hello(&self, peer: SocketAddr, hello: &Hello) -> Packet {
        let session = AlnpSession::new(AlnpRole::Node).with_timeout(self.session_timeout);
        if let Err(err) = session.begin_handshake() {
            return error_packet(ErrorCode::ProtocolViolation, err);
        }
        match self.handshake.on_hello(hello) {
            Ok((challenge, pending)) => {
                tracing::debug!(%peer, controller = %pending.controller().device_id, "handshake started");
                self.pending.insert(peer, (session, pending));
                Packet::Challenge(challenge)
            }
            Err(err) => {
                tracing::info!(%peer, error = %err, "handshake refused");
                error_packet(err.code(), err)
            }
        }
    }

    fn on_response(&self, peer: SocketAddr, response: &ChallengeResponse) -> Packet {
        let Some((_, (session, pending))) = self.pending.remove(&peer) else {
            return error_packet(ErrorCode::ProtocolViolation, "no handshake in progress");
        };
        let established = match pending.on_response(response, self.handshake.authenticator.as_ref()) {
            Ok(established) => established,
            Err(err) => {
                session.fail(err.to_string());
                tracing::info!(%peer, error = %err, "handshake refused");
                metrics::inc_errors();
                return error_packet(err.code(), err);
            }
        };
        if let Err(err) = session.complete_handshake(established.clone()) {
            return error_packet(ErrorCode::ProtocolViolation, err);
        }

        let replaced = self
            .sessions
            .insert(peer, PeerSession::new(session, established.session_id));
        if let Some(old) = replaced {
            old.session().close();
        } else {
            metrics::inc_sessions();
        }
        tracing::info!(%peer, session_id = %established.session_id, "session established");
        Packet::SessionEstablished(established)
    }

    fn on_control(&self, peer: SocketAddr, envelope: &ControlEnvelope) -> Option<Packet> {
        self.with_session(peer, envelope.session_id, |entry| {
            let mut responder = entry.responder();
            match responder.verify(envelope) {
                Ok(()) => {}
                Err(ControlError::Replay { seq, .. }) => {
                    tracing::debug!(%peer, seq, "control retransmission");
                    return responder.cached_ack(seq).cloned().map(Packet::Ack);
                }
                Err(err) => return Some(error_packet(ErrorCode::ProtocolViolation, err)),
            }
            let ack = match self.control_handler.as_ref().map(|handler| handler(envelope)) {
                None => responder.ack(envelope.seq, true, None),
                Some(Ok(detail)) => responder.ack(envelope.seq, true, detail),
                Some(Err(detail)) => responder.ack(envelope.seq, false, Some(detail)),
            };
            tracing::debug!(%peer, op = envelope.op.as_str(), seq = envelope.seq, ok = ack.ok, "control handled");
            responder.remember(ack.clone());
            Some(Packet::Ack(ack))
        })
    }

    fn on_frame(&self, peer: SocketAddr, envelope: FrameEnvelope) -> Option<ReceivedFrame> {
        let Some(entry) = self.sessions.get(&peer) else {
            tracing::debug!(%peer, "frame from unknown peer");
            metrics::inc_errors();
            return None;
        };
        if entry.session_id() != envelope.session_id || entry.session().ensure_streaming_ready().is_err() {
            tracing::debug!(%peer, session_id = %envelope.session_id, "frame for inactive session");
            metrics::inc_errors();
            return None;
        }
        entry.session().mark_streaming();
        entry.session().update_keepalive();

        let arrival_us = now_us();
        let deadline_us = envelope
            .timestamp_us
            .saturating_add(u64::try_from(self.frame_deadline.as_micros()).unwrap_or(u64::MAX));
        let network = {
            let mut conditions = entry.conditions();
            conditions.record_frame(envelope.sequence, arrival_us, deadline_us);
            conditions.metrics()
        };
        metrics::inc_frames(metrics::Direction::Inbound);
        Some(ReceivedFrame {
            peer,
            envelope,
            network,
        })
    }

    fn with_session<F>(&self, peer: SocketAddr, session_id: Uuid, f: F) -> Option<Packet>
    where
        F: FnOnce(&PeerSession) -> Option<Packet>,
    {
        match self.sessions.get(&peer) {
            Some(entry) if entry.session_id() == session_id => f(&entry),
            _ => Some(error_packet(ErrorCode::UnknownSession, "unknown session")),
        }
    }

    fn expire_sessions(&self) {
        let expired = self.sessions.prune();
        for _ in 0..expired {
            metrics::dec_sessions();
        }
        let (timeout, now) = (self.session_timeout, Instant::now());
        self.pending
            .retain(|_, (session, _)| !session.state().check_timeout(timeout, now));
    }

    async fn send(&self, peer: SocketAddr, packet: &Packet) -> Result<(), DeviceError> {
        let bytes = self
            .serializer
            .serialize(packet)
            .map_err(TransportError::Encode)?;
        if bytes.len() > self.max_datagram_size {
            return Err(TransportError::Oversized {
                len: bytes.len(),
                max: self.max_datagram_size,
            }
            .into());
        }
        self.socket.send_to(&bytes, peer).await?;
        Ok(())
    }
}

fn error_packet(code: ErrorCode, detail: impl ToString) -> Packet {
    Packet::Error(ErrorMessage {
        code,
        detail: detail.to_string(),
    })
}

fn now_us() -> u64 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    u64::try_from(micros).unwrap_or(u64::MAX)
}
