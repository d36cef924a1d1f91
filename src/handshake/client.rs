//! Controller side of the handshake.

use std::sync::Arc;

use super::{ChallengeAuthenticator, HandshakeContext, HandshakeError, fresh_nonce};
use crate::{
    message::{
        CapabilitySet,
        ChallengeResponse,
        DeviceIdentity,
        Hello,
        Packet,
        SessionEstablished,
    },
    transport::PacketTransport,
};

/// Drives the controller half of the handshake over a [`PacketTransport`].
#[derive(Clone)]
pub struct ClientHandshake {
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub authenticator: Arc<dyn ChallengeAuthenticator>,
    pub context: HandshakeContext,
}

impl ClientHandshake {
    /// Run the handshake to completion.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Authentication`] if the device signature does
    /// not verify, [`HandshakeError::Rejected`] if the device refuses the
    /// controller, and transport or protocol errors otherwise.
    pub async fn run<T>(&self, transport: &mut T) -> Result<SessionEstablished, HandshakeError>
    where
        T: PacketTransport + ?Sized,
    {
        let nonce = fresh_nonce();
        transport
            .send(Packet::Hello(Hello {
                version: self.context.version.clone(),
                identity: self.identity.clone(),
                capabilities: self.capabilities.clone(),
                nonce: nonce.clone(),
            }))
            .await?;

        let challenge = match transport.recv().await? {
            Packet::Challenge(challenge) => challenge,
            other => return Err(unexpected("challenge", &other)),
        };
        self.context.check_version(&challenge.version)?;
        if !self
            .authenticator
            .verify_challenge(&nonce, &challenge.signature)
        {
            return Err(HandshakeError::Authentication(
                "device signature did not verify".into(),
            ));
        }
        tracing::debug!(device = %challenge.identity.device_id, "device challenge verified");

        transport
            .send(Packet::ChallengeResponse(ChallengeResponse {
                signature: self.authenticator.sign_challenge(&challenge.nonce),
            }))
            .await?;

        match transport.recv().await? {
            Packet::SessionEstablished(established) => Ok(established),
            other => Err(unexpected("session_established", &other)),
        }
    }
}

fn unexpected(expected: &str, received: &Packet) -> HandshakeError {
    if let Packet::Error(error) = received {
        return HandshakeError::Rejected {
            code: error.code,
            detail: error.detail.clone(),
        };
    }
    HandshakeError::Protocol(format!(
        "expected {expected}, received {}",
        received.kind()
    ))
}
