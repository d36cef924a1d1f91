//! Frame streaming over an established session.
//!
//! [`AlnpStream`] turns caller [`Frame`]s into sequenced
//! [`FrameEnvelope`]s, applies the session's [`JitterStrategy`], tags frames
//! while recovery is active and hands the encoded datagram to a
//! [`FrameTransport`]. Receiver conditions fed back through
//! [`AlnpStream::observe_network_conditions`] drive both the recovery monitor
//! and the [`AdaptationState`].

mod adaptive;
mod jitter;
mod network;
mod recovery;

use std::{
    collections::BTreeMap,
    error::Error,
    io,
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

pub use adaptive::{
    AdaptationBounds,
    AdaptationEvent,
    AdaptationSettings,
    AdaptationState,
    DegradedReason,
};
use async_trait::async_trait;
pub use jitter::JitterStrategy;
pub use network::{NetworkConditions, NetworkMetrics};
pub use recovery::{RecoveryEvent, RecoveryMonitor, RecoveryReason};
use tokio::net::UdpSocket;

use crate::{
    client::BeforeSendHook,
    message::{Frame, FrameEnvelope, Packet},
    profile::CompiledStreamProfile,
    serializer::{BincodeSerializer, Serializer},
    session::{AlnpSession, SessionStateError},
    transport::DEFAULT_MAX_DATAGRAM_SIZE,
};

/// Metadata key added to frames sent while recovery is active.
pub const RECOVERY_METADATA_KEY: &str = "alpine_recovery";

/// Errors raised while sending a frame.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The session is not ready to stream.
    #[error("sender not authenticated")]
    NotAuthenticated(#[source] SessionStateError),
    /// Streaming has been paused on the session.
    #[error("streaming disabled")]
    StreamingDisabled,
    /// The envelope could not be encoded.
    #[error("failed to encode frame")]
    Encode(#[source] Box<dyn Error + Send + Sync>),
    /// The encoded frame exceeds the datagram limit.
    #[error("frame of {len} bytes exceeds datagram limit of {max} bytes")]
    Oversized { len: usize, max: usize },
    /// The transport failed to send.
    #[error("frame transport error: {0}")]
    Transport(#[from] io::Error),
}

/// Sink for encoded frame datagrams.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Send one encoded frame.
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<()>;
}

/// [`FrameTransport`] writing to a shared UDP socket.
#[derive(Clone, Debug)]
pub struct UdpFrameTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl UdpFrameTransport {
    #[must_use]
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self { Self { socket, peer } }
}

#[async_trait]
impl FrameTransport for UdpFrameTransport {
    async fn send_frame(&self, bytes: &[u8]) -> io::Result<()> {
        self.socket.send_to(bytes, self.peer).await.map(drop)
    }
}

/// Sequenced frame sender bound to one session and profile.
pub struct AlnpStream<T> {
    session: AlnpSession,
    transport: T,
    profile: CompiledStreamProfile,
    last_channels: Mutex<Option<Vec<u16>>>,
    recovery: Mutex<RecoveryMonitor>,
    adaptation: Mutex<AdaptationState>,
    sequence: AtomicU64,
    serializer: BincodeSerializer,
    max_datagram_size: usize,
    before_send: Vec<BeforeSendHook>,
}

impl<T: FrameTransport> AlnpStream<T> {
    /// Create a stream over `transport` using `profile`.
    #[must_use]
    pub fn new(session: AlnpSession, transport: T, profile: CompiledStreamProfile) -> Self {
        let adaptation = AdaptationState::baseline(profile.intent());
        Self {
            session,
            transport,
            profile,
            last_channels: Mutex::new(None),
            recovery: Mutex::new(RecoveryMonitor::new()),
            adaptation: Mutex::new(adaptation),
            sequence: AtomicU64::new(0),
            serializer: BincodeSerializer,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            before_send: Vec::new(),
        }
    }

    /// Set the largest datagram this stream will send.
    #[must_use]
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Run `hooks` on every encoded frame, in order, before it is sent.
    #[must_use]
    pub fn with_before_send(mut self, hooks: Vec<BeforeSendHook>) -> Self {
        self.before_send = hooks;
        self
    }

    /// Profile bound to this stream.
    #[must_use]
    pub fn profile(&self) -> &CompiledStreamProfile { &self.profile }

    /// Sequence number of the most recently sent frame, `0` before the first.
    #[must_use]
    pub fn last_sequence(&self) -> u64 { self.sequence.load(Ordering::Acquire) }

    /// Encode and send `frame`, returning its sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NotAuthenticated`] unless the session is ready,
    /// [`StreamError::StreamingDisabled`] while streaming is paused, and
    /// encoding, size or transport errors otherwise.
    pub async fn send(&self, frame: Frame) -> Result<u64, StreamError> {
        let established = self
            .session
            .ensure_streaming_ready()
            .map_err(StreamError::NotAuthenticated)?;
        if !self.session.streaming_enabled() {
            return Err(StreamError::StreamingDisabled);
        }

        let strategy = self
            .session
            .jitter_override()
            .unwrap_or_else(|| JitterStrategy::for_profile(&self.profile));
        let channels = {
            let last = self.last_channels.lock().unwrap_or_else(PoisonError::into_inner);
            strategy.apply(&frame.channels, last.as_deref())
        };

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let envelope = FrameEnvelope {
            session_id: established.session_id,
            sequence,
            timestamp_us: now_us(),
            config_id: self.profile.config_id().to_string(),
            priority: frame.priority,
            channel_format: frame.channel_format,
            channels,
            groups: frame.groups,
            metadata: self.attach_recovery_metadata(frame.metadata),
        };

        let packet = Packet::Frame(envelope);
        let mut bytes = self
            .serializer
            .serialize(&packet)
            .map_err(StreamError::Encode)?;
        for hook in &self.before_send {
            hook(&mut bytes);
        }
        if bytes.len() > self.max_datagram_size {
            return Err(StreamError::Oversized {
                len: bytes.len(),
                max: self.max_datagram_size,
            });
        }
        self.transport.send_frame(&bytes).await?;

        if let Packet::Frame(envelope) = packet {
            *self.last_channels.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(envelope.channels);
        }
        tracing::trace!(sequence, bytes = bytes.len(), "frame sent");
        Ok(sequence)
    }

    /// Feed receiver-side conditions into the recovery monitor, then take
    /// one adaptation step with the resulting recovery reason.
    ///
    /// Returns the recovery transition, if any; adaptation changes are
    /// logged and visible through [`adaptation`](Self::adaptation).
    pub fn observe_network_conditions(&self, conditions: &NetworkConditions) -> Option<RecoveryEvent> {
        let (event, reason) = {
            let mut recovery = self.recovery.lock().unwrap_or_else(PoisonError::into_inner);
            let event = recovery.feed(conditions);
            (event, recovery.active_reason())
        };
        match event {
            Some(RecoveryEvent::RecoveryStarted(reason)) => tracing::warn!(
                target: "alpine::recovery",
                reason = reason.as_str(),
                "recovery started"
            ),
            Some(RecoveryEvent::RecoveryComplete(reason)) => tracing::info!(
                target: "alpine::recovery",
                reason = reason.as_str(),
                "recovery complete"
            ),
            None => {}
        }
        self.adapt(conditions, reason);
        event
    }

    /// Current adaptation state.
    #[must_use]
    pub fn adaptation(&self) -> AdaptationState {
        self.adaptation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn adapt(&self, conditions: &NetworkConditions, recovery: Option<RecoveryReason>) {
        let mut state = self.adaptation.lock().unwrap_or_else(PoisonError::into_inner);
        let (next, event) = state.decide(conditions, recovery);
        *state = next;
        if let Some(event) = event {
            let settings = state.settings();
            tracing::debug!(
                target: "alpine::adaptation",
                event = event.as_str(),
                keyframe_interval = settings.keyframe_interval,
                delta_depth = settings.delta_depth,
                deadline_offset_ms = settings.deadline_offset_ms,
                "stream adapted"
            );
        }
    }

    /// Whether frames are currently tagged for recovery.
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_recovering()
    }

    fn attach_recovery_metadata(
        &self,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Option<BTreeMap<String, String>> {
        let reason = self
            .recovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active_reason();
        let Some(reason) = reason else {
            return metadata;
        };
        let mut map = metadata.unwrap_or_default();
        map.insert(RECOVERY_METADATA_KEY.to_string(), reason.as_str().to_string());
        Some(map)
    }
}

fn now_us() -> u64 {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros();
    u64::try_from(micros).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use rstest::{fixture, rstest};
    use uuid::Uuid;

    use super::*;
    use crate::{
        message::{CapabilitySet, ChannelFormat, DeviceIdentity, SessionEstablished},
        profile::StreamProfile,
        session::AlnpRole,
    };

    /// Records every datagram instead of sending it.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<Vec<u8>>>>);

    impl Capture {
        fn envelopes(&self) -> Vec<FrameEnvelope> {
            self.0
                .lock()
                .expect("capture lock")
                .iter()
                .map(|bytes| {
                    let (packet, _) = BincodeSerializer
                        .deserialize::<Packet>(bytes)
                        .expect("decode captured frame");
                    match packet {
                        Packet::Frame(envelope) => envelope,
                        other => panic!("unexpected packet {}", other.kind()),
                    }
                })
                .collect()
        }
    }

    #[async_trait]
    impl FrameTransport for Capture {
        async fn send_frame(&self, bytes: &[u8]) -> io::Result<()> {
            self.0.lock().expect("capture lock").push(bytes.to_vec());
            Ok(())
        }
    }

    #[fixture]
    fn session() -> AlnpSession {
        let session = AlnpSession::new(AlnpRole::Controller);
        session.begin_handshake().expect("handshake");
        session
            .complete_handshake(SessionEstablished {
                session_id: Uuid::new_v4(),
                device_identity: DeviceIdentity::generate("acme", "dimmer"),
                capabilities: CapabilitySet::default(),
            })
            .expect("ready");
        session
    }

    fn stream(session: &AlnpSession, profile: StreamProfile) -> (AlnpStream<Capture>, Capture) {
        let capture = Capture::default();
        let compiled = profile.compile().expect("valid profile");
        (
            AlnpStream::new(session.clone(), capture.clone(), compiled),
            capture,
        )
    }

    #[rstest]
    #[tokio::test]
    async fn hold_last_repeats_previous_channels(session: AlnpSession) {
        let (stream, capture) = stream(&session, StreamProfile::realtime());
        stream
            .send(Frame::new(ChannelFormat::U8, vec![10, 20, 30]))
            .await
            .expect("first");
        stream
            .send(Frame::new(ChannelFormat::U8, Vec::new()))
            .await
            .expect("second");

        let sent = capture.envelopes();
        assert_eq!(sent[1].channels, vec![10, 20, 30]);
        assert_eq!(
            sent.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
        let established = session.established().expect("established");
        assert!(sent.iter().all(|e| e.session_id == established.session_id));
    }

    #[rstest]
    #[tokio::test]
    async fn install_profile_smooths_channels(session: AlnpSession) {
        let (stream, capture) = stream(&session, StreamProfile::install());
        stream
            .send(Frame::new(ChannelFormat::U8, vec![100, 200]))
            .await
            .expect("first");
        stream
            .send(Frame::new(ChannelFormat::U8, vec![0, 0, 50]))
            .await
            .expect("second");
        assert_eq!(capture.envelopes()[1].channels, vec![50, 100, 25]);
    }

    #[rstest]
    #[tokio::test]
    async fn paused_stream_refuses_frames(session: AlnpSession) {
        let (stream, capture) = stream(&session, StreamProfile::auto());
        session.set_streaming_enabled(false);
        let err = stream
            .send(Frame::new(ChannelFormat::U8, vec![1]))
            .await
            .expect_err("paused");
        assert!(matches!(err, StreamError::StreamingDisabled));
        assert!(capture.envelopes().is_empty());
    }

    #[tokio::test]
    async fn unauthenticated_session_is_refused() {
        let (stream, _) = stream(&AlnpSession::new(AlnpRole::Controller), StreamProfile::auto());
        let err = stream
            .send(Frame::new(ChannelFormat::U8, vec![1]))
            .await
            .expect_err("not ready");
        assert!(matches!(
            err,
            StreamError::NotAuthenticated(SessionStateError::NotReady("init"))
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn recovery_tags_frames(session: AlnpSession) {
        let (stream, capture) = stream(&session, StreamProfile::auto());
        let mut lossy = NetworkConditions::new();
        lossy.record_frame(1, 0, 0);
        lossy.record_frame(6, 1_000, 0);
        assert_eq!(
            stream.observe_network_conditions(&lossy),
            Some(RecoveryEvent::RecoveryStarted(RecoveryReason::BurstLoss))
        );
        assert!(stream.is_recovering());

        stream
            .send(Frame::new(ChannelFormat::U8, vec![1]).with_metadata("scene", "a"))
            .await
            .expect("send");
        let metadata = capture.envelopes()[0].metadata.clone().expect("metadata");
        assert_eq!(metadata.get(RECOVERY_METADATA_KEY).map(String::as_str), Some("burst_loss"));
        assert_eq!(metadata.get("scene").map(String::as_str), Some("a"));
    }

    #[rstest]
    fn observed_conditions_drive_adaptation(session: AlnpSession) {
        let (stream, _) = stream(&session, StreamProfile::auto());
        let baseline = stream.adaptation();
        assert_eq!(baseline.intent(), stream.profile().intent());
        let mut lossy = NetworkConditions::new();
        lossy.record_frame(1, 0, 0);
        lossy.record_frame(2, 1_000, 0);
        lossy.record_frame(9, 2_000, 0);

        stream.observe_network_conditions(&lossy);
        let adapted = stream.adaptation();
        assert_eq!(
            adapted.settings().keyframe_interval,
            baseline.settings().keyframe_interval - 1
        );
        assert_eq!(adapted.frames_in_state(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn hooks_see_encoded_bytes(session: AlnpSession) {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let hook: BeforeSendHook = Arc::new(move |bytes: &mut Vec<u8>| {
            counter.fetch_add(bytes.len(), Ordering::Relaxed);
        });
        let (stream, capture) = stream(&session, StreamProfile::auto());
        let stream = stream.with_before_send(vec![hook]);
        stream
            .send(Frame::new(ChannelFormat::U8, vec![1, 2]))
            .await
            .expect("send");
        let sent_len = capture.0.lock().expect("capture lock")[0].len();
        assert_eq!(seen.load(Ordering::Relaxed), sent_len);
    }

    #[rstest]
    #[tokio::test]
    async fn oversized_frames_are_rejected(session: AlnpSession) {
        let (stream, _) = stream(&session, StreamProfile::auto());
        let stream = stream.with_max_datagram_size(8);
        let err = stream
            .send(Frame::new(ChannelFormat::U16, vec![u16::MAX; 64]))
            .await
            .expect_err("too large");
        assert!(matches!(err, StreamError::Oversized { max: 8, .. }));
    }
}
