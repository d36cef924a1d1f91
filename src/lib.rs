#![doc(html_root_url = "https://docs.rs/alpine-sdk/latest")]
//! Public API for the `alpine-sdk` library.
//!
//! This crate provides an asynchronous controller client for the Authenticated
//! Lighting Network Protocol (ALPINE): discovery, session handshake, stream
//! profiles, frame streaming, keepalive and a reliable control plane. The
//! [`SdkClient`] facade wraps any frame-sending capability, with
//! [`AlpineClient`] as the default one.

pub mod client;
pub mod control;
pub mod device;
pub mod discovery;
pub mod handshake;
pub mod keepalive;
pub mod message;
pub mod metrics;
pub mod profile;
pub mod registry;
pub mod sdk;
pub mod serializer;
pub mod session;
pub mod stream;
pub mod transport;

pub use client::{
    AlpineClient,
    AlpineClientBuilder,
    ClientError,
    ConnectOptions,
    SocketOptions,
    TracingConfig,
};
pub use control::{ControlClient, ControlError, ControlResponder, ReliableControlChannel};
pub use device::{ControlHandler, DeviceError, DeviceServer, ReceivedFrame};
pub use discovery::{DiscoveredDevice, DiscoveryClient, DiscoveryError, DiscoveryResponder};
pub use handshake::{
    ChallengeAuthenticator,
    ClientHandshake,
    HandshakeError,
    ServerHandshake,
    StaticKeyAuthenticator,
};
pub use message::{
    ALPINE_VERSION,
    Acknowledge,
    CapabilitySet,
    ChannelFormat,
    ControlEnvelope,
    ControlOp,
    DeviceIdentity,
    Frame,
    FrameEnvelope,
    Packet,
    SessionEstablished,
};
pub use profile::{CompiledStreamProfile, ProfileError, StreamIntent, StreamProfile};
pub use registry::{PeerSession, SessionRegistry};
pub use sdk::{Connect, FrameClient, SdkClient};
pub use serializer::{BincodeSerializer, Serializer};
pub use session::{AlnpRole, AlnpSession, SessionState, SessionStateError};
pub use stream::{
    AdaptationEvent,
    AdaptationState,
    AlnpStream,
    FrameTransport,
    JitterStrategy,
    NetworkConditions,
    NetworkMetrics,
    RecoveryEvent,
    RecoveryReason,
    StreamError,
    UdpFrameTransport,
};
pub use transport::{
    PacketTransport,
    PipeTransport,
    TimeoutTransport,
    TransportError,
    UdpPacketTransport,
};
