//! Error types for ALPINE client operations.

use std::io;

use crate::{
    control::ControlError,
    handshake::HandshakeError,
    profile::ProfileError,
    session::SessionStateError,
    stream::StreamError,
};

/// Errors emitted by [`crate::AlpineClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Socket setup or I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The handshake failed or the session refused a transition.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    /// A frame could not be sent.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),
    /// The stream profile failed validation.
    #[error("invalid stream profile: {0}")]
    Profile(#[from] ProfileError),
    /// A control request was not acknowledged.
    #[error("control error: {0}")]
    Control(#[from] ControlError),
    /// `send_frame` was called before `start_stream`.
    #[error("stream not started")]
    StreamNotStarted,
    /// The session holds no established parameters.
    #[error("session missing")]
    SessionMissing,
}

impl From<SessionStateError> for ClientError {
    fn from(err: SessionStateError) -> Self { Self::Handshake(HandshakeError::Session(err)) }
}
