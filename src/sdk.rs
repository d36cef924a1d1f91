//! Thin SDK facade over a frame-sending client.
//!
//! [`SdkClient`] holds a client capability and forwards connection
//! establishment and frame transmission to it. It adds no behaviour of its
//! own: options, frames, results and errors pass through untouched. Any type
//! implementing [`FrameClient`] can be wrapped; [`Connect`] adds the factory
//! used by [`SdkClient::connect`]. [`AlpineClient`] is the default capability.

use async_trait::async_trait;

use crate::{
    client::{AlpineClient, ClientError, ConnectOptions},
    message::{Acknowledge, ControlOp, Frame},
    profile::StreamProfile,
    session::AlnpSession,
};

/// A connected client able to transmit frames.
#[async_trait]
pub trait FrameClient: Send + Sync {
    /// Unit of data accepted by [`send_frame`](Self::send_frame).
    type Frame: Send + 'static;
    /// Result of a transmission.
    type Output;

    /// Transmit one frame.
    async fn send_frame(&self, frame: Self::Frame) -> Self::Output;
}

/// Factory producing a connected [`FrameClient`].
#[async_trait]
pub trait Connect: FrameClient + Sized {
    /// Everything needed to establish a connection.
    type Options: Send + 'static;
    /// Failure raised while connecting.
    type Error;

    /// Establish a connection described by `options`.
    async fn connect(options: Self::Options) -> Result<Self, Self::Error>;
}

#[async_trait]
impl FrameClient for AlpineClient {
    type Frame = Frame;
    type Output = Result<(), ClientError>;

    async fn send_frame(&self, frame: Frame) -> Self::Output { AlpineClient::send_frame(self, frame).await }
}

#[async_trait]
impl Connect for AlpineClient {
    type Options = ConnectOptions;
    type Error = ClientError;

    async fn connect(options: ConnectOptions) -> Result<Self, ClientError> {
        AlpineClient::connect(options).await
    }
}

/// Facade delegating to a client capability.
///
/// # Examples
///
/// ```no_run
/// use alpine_sdk::{ChannelFormat, ConnectOptions, Frame, SdkClient, StreamProfile};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), alpine_sdk::ClientError> {
/// let options = ConnectOptions::new("192.0.2.10:5555".parse().expect("addr"));
/// let mut sdk: SdkClient = SdkClient::connect(options).await?;
/// sdk.start_stream(StreamProfile::default())?;
/// sdk.send_frame(Frame::new(ChannelFormat::U8, vec![0, 255])).await?;
/// sdk.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SdkClient<C = AlpineClient> {
    client: C,
}

impl<C> SdkClient<C> {
    /// Wrap an already connected client.
    #[must_use]
    pub const fn new(client: C) -> Self { Self { client } }

    /// Borrow the wrapped client.
    #[must_use]
    pub const fn inner(&self) -> &C { &self.client }

    /// Mutably borrow the wrapped client.
    pub fn inner_mut(&mut self) -> &mut C { &mut self.client }

    /// Unwrap the client.
    #[must_use]
    pub fn into_inner(self) -> C { self.client }
}

impl<C: Connect> SdkClient<C> {
    /// Connect through `C`'s factory and wrap the result.
    ///
    /// # Errors
    ///
    /// Returns the factory's error unchanged.
    pub async fn connect(options: C::Options) -> Result<Self, C::Error> {
        C::connect(options).await.map(Self::new)
    }
}

impl<C: FrameClient> SdkClient<C> {
    /// Forward `frame` to the wrapped client and return its output unchanged.
    pub async fn send_frame(&self, frame: C::Frame) -> C::Output { self.client.send_frame(frame).await }
}

#[async_trait]
impl<C: FrameClient> FrameClient for SdkClient<C> {
    type Frame = C::Frame;
    type Output = C::Output;

    async fn send_frame(&self, frame: C::Frame) -> C::Output { self.client.send_frame(frame).await }
}

impl SdkClient<AlpineClient> {
    /// See [`AlpineClient::start_stream`].
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged.
    pub fn start_stream(&mut self, profile: StreamProfile) -> Result<String, ClientError> {
        self.client.start_stream(profile)
    }

    /// See [`AlpineClient::control`].
    ///
    /// # Errors
    ///
    /// Returns the client's error unchanged.
    pub async fn control(&self, op: ControlOp, payload: Vec<u8>) -> Result<Acknowledge, ClientError> {
        self.client.control(op, payload).await
    }

    /// See [`AlpineClient::session`].
    #[must_use]
    pub fn session(&self) -> &AlnpSession { self.client.session() }

    /// See [`AlpineClient::close`].
    pub async fn close(self) { self.client.close().await; }
}

impl<C> From<C> for SdkClient<C> {
    fn from(client: C) -> Self { Self::new(client) }
}
