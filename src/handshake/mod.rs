//! Session handshake between a controller and a device.
//!
//! The controller opens with [`Hello`](crate::message::Hello); the device
//! proves its credential in a [`Challenge`](crate::message::Challenge); the
//! controller answers with a [`ChallengeResponse`](crate::message::ChallengeResponse)
//! and the device confirms with
//! [`SessionEstablished`](crate::message::SessionEstablished). Both sides sign
//! the other side's nonce through a [`ChallengeAuthenticator`].

mod auth;
mod client;
mod server;

pub use auth::{ChallengeAuthenticator, StaticKeyAuthenticator};
pub use client::ClientHandshake;
pub use server::{PendingHandshake, ServerHandshake};

use crate::{
    message::{ALPINE_VERSION, ErrorCode, NONCE_LEN},
    session::SessionStateError,
    transport::TransportError,
};

/// Errors raised while establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The transport failed or timed out.
    #[error("handshake transport error: {0}")]
    Transport(#[from] TransportError),
    /// The peer sent something out of sequence.
    #[error("handshake protocol error: {0}")]
    Protocol(String),
    /// A signature did not verify.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The peer speaks another protocol version.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(String),
    /// The peer refused the handshake.
    #[error("handshake rejected by peer ({code:?}): {detail}")]
    Rejected { code: ErrorCode, detail: String },
    /// The local session refused a state transition.
    #[error(transparent)]
    Session(#[from] SessionStateError),
}

impl HandshakeError {
    /// Wire code used when reporting this failure to the peer.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication(_) => ErrorCode::AuthenticationFailed,
            Self::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            _ => ErrorCode::ProtocolViolation,
        }
    }
}

/// Parameters shared by both handshake roles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeContext {
    /// Protocol version offered and required.
    pub version: String,
}

impl Default for HandshakeContext {
    fn default() -> Self {
        Self {
            version: ALPINE_VERSION.to_string(),
        }
    }
}

impl HandshakeContext {
    pub(crate) fn check_version(&self, offered: &str) -> Result<(), HandshakeError> {
        if offered == self.version {
            Ok(())
        } else {
            Err(HandshakeError::UnsupportedVersion(offered.to_string()))
        }
    }
}

pub(crate) fn fresh_nonce() -> Vec<u8> { rand::random::<[u8; NONCE_LEN]>().to_vec() }
