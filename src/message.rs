//! Wire data model for ALPINE datagrams.
//!
//! Every UDP datagram carries exactly one [`Packet`]. The structures here are
//! plain serde types; encoding is left to a [`Serializer`](crate::Serializer).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Protocol version spoken by this implementation.
pub const ALPINE_VERSION: &str = "1.0";

/// Length in bytes of handshake and discovery nonces.
pub const NONCE_LEN: usize = 32;

/// Encoding width of a channel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelFormat {
    /// 8-bit channel values (`0..=255`).
    U8,
    /// 16-bit channel values.
    U16,
}

/// Identity advertised by a controller or device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub manufacturer_id: String,
    pub model_id: String,
    pub hardware_rev: String,
    pub firmware_rev: String,
}

impl DeviceIdentity {
    /// Build an identity with a fresh random device id.
    #[must_use]
    pub fn generate(manufacturer_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            manufacturer_id: manufacturer_id.into(),
            model_id: model_id.into(),
            hardware_rev: "rev1".into(),
            firmware_rev: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Features a peer supports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub channel_formats: Vec<ChannelFormat>,
    pub max_channels: u32,
    pub grouping_supported: bool,
    pub streaming_supported: bool,
    pub encryption_supported: bool,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self {
            channel_formats: vec![ChannelFormat::U8],
            max_channels: 512,
            grouping_supported: false,
            streaming_supported: true,
            encryption_supported: false,
        }
    }
}

impl CapabilitySet {
    /// Capabilities both peers support.
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::{CapabilitySet, ChannelFormat};
    ///
    /// let device = CapabilitySet {
    ///     channel_formats: vec![ChannelFormat::U8, ChannelFormat::U16],
    ///     max_channels: 1024,
    ///     ..CapabilitySet::default()
    /// };
    /// let agreed = CapabilitySet::default().negotiate(&device);
    /// assert_eq!(agreed.channel_formats, vec![ChannelFormat::U8]);
    /// assert_eq!(agreed.max_channels, 512);
    /// ```
    #[must_use]
    pub fn negotiate(&self, other: &Self) -> Self {
        Self {
            channel_formats: self
                .channel_formats
                .iter()
                .copied()
                .filter(|format| other.channel_formats.contains(format))
                .collect(),
            max_channels: self.max_channels.min(other.max_channels),
            grouping_supported: self.grouping_supported && other.grouping_supported,
            streaming_supported: self.streaming_supported && other.streaming_supported,
            encryption_supported: self.encryption_supported && other.encryption_supported,
        }
    }
}

/// First handshake message, sent by the controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub version: String,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub nonce: Vec<u8>,
}

/// Device answer to [`Hello`], proving possession of the shared credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub version: String,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub nonce: Vec<u8>,
    /// Signature over the controller's nonce.
    pub signature: Vec<u8>,
}

/// Controller signature over the device nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub signature: Vec<u8>,
}

/// Final handshake message carrying the negotiated session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEstablished {
    pub session_id: Uuid,
    pub device_identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
}

/// Liveness signal for an established session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keepalive {
    pub session_id: Uuid,
}

/// Announces that the sender is leaving the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    pub session_id: Uuid,
}

/// Control-plane operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlOp {
    Identify,
    GetStatus,
    GetInfo,
    SetMode,
    Restart,
    Custom(String),
}

impl ControlOp {
    /// Short name used in logs and spans.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identify => "identify",
            Self::GetStatus => "get_status",
            Self::GetInfo => "get_info",
            Self::SetMode => "set_mode",
            Self::Restart => "restart",
            Self::Custom(name) => name,
        }
    }
}

/// Sequenced control request bound to a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEnvelope {
    pub session_id: Uuid,
    pub seq: u64,
    pub op: ControlOp,
    pub payload: Vec<u8>,
}

/// Device answer to a [`ControlEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledge {
    pub session_id: Uuid,
    pub seq: u64,
    pub ok: bool,
    pub detail: Option<String>,
}

/// Reason carried by a [`ErrorMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthenticationFailed,
    UnsupportedVersion,
    UnknownSession,
    ProtocolViolation,
}

/// Rejection sent by a device when it refuses a packet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: ErrorCode,
    pub detail: String,
}

/// Caller-facing frame of lighting channel values.
///
/// # Examples
///
/// ```
/// use alpine_sdk::{ChannelFormat, Frame};
///
/// let frame = Frame::new(ChannelFormat::U8, vec![0, 128, 255])
///     .with_priority(10)
///     .with_metadata("scene", "intro");
/// assert_eq!(frame.priority, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub channel_format: ChannelFormat,
    pub channels: Vec<u16>,
    pub priority: u8,
    pub groups: Option<HashMap<String, Vec<u16>>>,
    pub metadata: Option<BTreeMap<String, String>>,
}

impl Frame {
    /// Create a frame with default priority and no groups or metadata.
    #[must_use]
    pub fn new(channel_format: ChannelFormat, channels: Vec<u16>) -> Self {
        Self {
            channel_format,
            channels,
            priority: 0,
            groups: None,
            metadata: None,
        }
    }

    /// Set the frame priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Add a named channel group.
    #[must_use]
    pub fn with_group(mut self, name: impl Into<String>, channels: Vec<u16>) -> Self {
        self.groups
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), channels);
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Streaming frame as it travels on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEnvelope {
    pub session_id: Uuid,
    pub sequence: u64,
    pub timestamp_us: u64,
    pub config_id: String,
    pub priority: u8,
    pub channel_format: ChannelFormat,
    pub channels: Vec<u16>,
    pub groups: Option<HashMap<String, Vec<u16>>>,
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Broadcast request looking for devices.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub version: String,
    pub nonce: Vec<u8>,
    pub requested: Vec<String>,
}

/// Device answer to a [`DiscoveryRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    pub version: String,
    /// Echo of the request nonce.
    pub nonce: Vec<u8>,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    /// Device signature over the request nonce, when the device signs replies.
    pub signature: Option<Vec<u8>>,
}

/// A single ALPINE datagram.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    DiscoverRequest(DiscoveryRequest),
    DiscoverReply(DiscoveryReply),
    Hello(Hello),
    Challenge(Challenge),
    ChallengeResponse(ChallengeResponse),
    SessionEstablished(SessionEstablished),
    Keepalive(Keepalive),
    Control(ControlEnvelope),
    Ack(Acknowledge),
    Frame(FrameEnvelope),
    Close(Close),
    Error(ErrorMessage),
}

impl Packet {
    /// Packet kind for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DiscoverRequest(_) => "discover_request",
            Self::DiscoverReply(_) => "discover_reply",
            Self::Hello(_) => "hello",
            Self::Challenge(_) => "challenge",
            Self::ChallengeResponse(_) => "challenge_response",
            Self::SessionEstablished(_) => "session_established",
            Self::Keepalive(_) => "keepalive",
            Self::Control(_) => "control",
            Self::Ack(_) => "ack",
            Self::Frame(_) => "frame",
            Self::Close(_) => "close",
            Self::Error(_) => "error",
        }
    }
}
