//! Device side of the handshake.
//!
//! The device reads every datagram from one socket, so its half is split into
//! two synchronous steps ([`ServerHandshake::on_hello`] and
//! [`PendingHandshake::on_response`]) that the device loop calls as packets
//! arrive. [`ServerHandshake::run`] chains them over a transport.

use std::sync::Arc;

use uuid::Uuid;

use super::{ChallengeAuthenticator, HandshakeContext, HandshakeError, fresh_nonce};
use crate::{
    message::{
        CapabilitySet,
        Challenge,
        ChallengeResponse,
        DeviceIdentity,
        ErrorMessage,
        Hello,
        Packet,
        SessionEstablished,
    },
    transport::PacketTransport,
};

/// Device configuration for answering handshakes.
#[derive(Clone)]
pub struct ServerHandshake {
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    pub authenticator: Arc<dyn ChallengeAuthenticator>,
    pub context: HandshakeContext,
}

/// Handshake awaiting the controller's [`ChallengeResponse`].
#[derive(Clone, Debug)]
pub struct PendingHandshake {
    nonce: Vec<u8>,
    controller: DeviceIdentity,
    agreed: CapabilitySet,
    device: DeviceIdentity,
}

impl PendingHandshake {
    /// Identity the controller announced.
    #[must_use]
    pub fn controller(&self) -> &DeviceIdentity { &self.controller }

    /// Verify the controller's signature and mint the session.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Authentication`] if the signature does not
    /// verify.
    pub fn on_response(
        self,
        response: &ChallengeResponse,
        authenticator: &dyn ChallengeAuthenticator,
    ) -> Result<SessionEstablished, HandshakeError> {
        if !authenticator.verify_challenge(&self.nonce, &response.signature) {
            return Err(HandshakeError::Authentication(
                "controller signature did not verify".into(),
            ));
        }
        Ok(SessionEstablished {
            session_id: Uuid::new_v4(),
            device_identity: self.device,
            capabilities: self.agreed,
        })
    }
}

impl ServerHandshake {
    /// Validate a [`Hello`] and produce the challenge to send back.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::UnsupportedVersion`] when the controller
    /// offers another protocol version.
    pub fn on_hello(&self, hello: &Hello) -> Result<(Challenge, PendingHandshake), HandshakeError> {
        self.context.check_version(&hello.version)?;
        let nonce = fresh_nonce();
        let challenge = Challenge {
            version: self.context.version.clone(),
            identity: self.identity.clone(),
            capabilities: self.capabilities.clone(),
            nonce: nonce.clone(),
            signature: self.authenticator.sign_challenge(&hello.nonce),
        };
        let pending = PendingHandshake {
            nonce,
            controller: hello.identity.clone(),
            agreed: self.capabilities.negotiate(&hello.capabilities),
            device: self.identity.clone(),
        };
        Ok((challenge, pending))
    }

    /// Answer one handshake over `transport`.
    ///
    /// Failures are reported to the controller with an
    /// [`ErrorMessage`] before being returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`HandshakeError`] encountered.
    pub async fn run<T>(&self, transport: &mut T) -> Result<SessionEstablished, HandshakeError>
    where
        T: PacketTransport + ?Sized,
    {
        let hello = match transport.recv().await? {
            Packet::Hello(hello) => hello,
            other => {
                return Err(HandshakeError::Protocol(format!(
                    "expected hello, received {}",
                    other.kind()
                )));
            }
        };
        let (challenge, pending) = match self.on_hello(&hello) {
            Ok(step) => step,
            Err(err) => return Err(reject(transport, err).await),
        };
        transport.send(Packet::Challenge(challenge)).await?;

        let response = match transport.recv().await? {
            Packet::ChallengeResponse(response) => response,
            other => {
                return Err(HandshakeError::Protocol(format!(
                    "expected challenge_response, received {}",
                    other.kind()
                )));
            }
        };
        let established = match pending.on_response(&response, self.authenticator.as_ref()) {
            Ok(established) => established,
            Err(err) => return Err(reject(transport, err).await),
        };
        transport
            .send(Packet::SessionEstablished(established.clone()))
            .await?;
        Ok(established)
    }
}

async fn reject<T>(transport: &mut T, err: HandshakeError) -> HandshakeError
where
    T: PacketTransport + ?Sized,
{
    let notice = Packet::Error(ErrorMessage {
        code: err.code(),
        detail: err.to_string(),
    });
    if let Err(send_err) = transport.send(notice).await {
        tracing::debug!(error = %send_err, "failed to report handshake rejection");
    }
    err
}
