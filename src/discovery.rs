//! Device discovery.
//!
//! [`DiscoveryClient`] broadcasts a [`DiscoveryRequest`] with a fresh nonce and
//! collects [`DiscoveryReply`]s until its timeout. Devices answer through a
//! [`DiscoveryResponder`], optionally signing the nonce so the controller can
//! tell trusted devices apart.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    net::UdpSocket,
    time::{self, Instant},
};

use crate::{
    handshake::ChallengeAuthenticator,
    message::{
        ALPINE_VERSION,
        CapabilitySet,
        DeviceIdentity,
        DiscoveryReply,
        DiscoveryRequest,
        NONCE_LEN,
        Packet,
    },
    serializer::{BincodeSerializer, Serializer},
    transport::DEFAULT_MAX_DATAGRAM_SIZE,
};

/// Errors raised during discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("discovery io error: {0}")]
    Io(#[from] io::Error),
    #[error("timeout waiting for replies")]
    Timeout,
    #[error("failed to encode discovery request: {0}")]
    Encode(String),
    #[error("failed to decode discovery reply: {0}")]
    Decode(String),
    #[error("unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("reply nonce does not match the request")]
    NonceMismatch,
    #[error("reply signature invalid")]
    SignatureInvalid,
}

/// A device that answered a discovery request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub addr: SocketAddr,
    pub identity: DeviceIdentity,
    pub capabilities: CapabilitySet,
    /// Whether the reply carried a signature that verified.
    pub signed: bool,
}

/// Broadcast discovery client.
#[derive(Clone)]
pub struct DiscoveryClient {
    local_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    requested: Vec<String>,
    timeout: Duration,
    verifier: Option<Arc<dyn ChallengeAuthenticator>>,
}

impl DiscoveryClient {
    #[must_use]
    pub fn new(
        local_addr: SocketAddr,
        broadcast_addr: SocketAddr,
        requested: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            local_addr,
            broadcast_addr,
            requested,
            timeout,
            verifier: None,
        }
    }

    /// Require replies to be signed and verify them with `verifier`.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn ChallengeAuthenticator>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Broadcast a request and collect replies until the timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Timeout`] when no device answered, and a
    /// validation error for the first malformed reply.
    pub async fn discover(&self) -> Result<Vec<DiscoveredDevice>, DiscoveryError> {
        let socket = UdpSocket::bind(self.local_addr).await?;
        socket.set_broadcast(true)?;

        let nonce = rand::random::<[u8; NONCE_LEN]>().to_vec();
        let request = Packet::DiscoverRequest(DiscoveryRequest {
            version: ALPINE_VERSION.to_string(),
            nonce: nonce.clone(),
            requested: self.requested.clone(),
        });
        let bytes = BincodeSerializer
            .serialize(&request)
            .map_err(|err| DiscoveryError::Encode(err.to_string()))?;
        socket.send_to(&bytes, self.broadcast_addr).await?;
        tracing::debug!(broadcast = %self.broadcast_addr, "discovery request sent");

        let deadline = Instant::now() + self.timeout;
        let mut devices = Vec::new();
        let mut buf = vec![0u8; DEFAULT_MAX_DATAGRAM_SIZE];
        while let Ok(received) = time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            let (len, addr) = received?;
            let reply = match BincodeSerializer.deserialize::<Packet>(&buf[..len]) {
                Ok((Packet::DiscoverReply(reply), _)) => reply,
                Ok((other, _)) => {
                    tracing::trace!(%addr, kind = other.kind(), "ignoring non-reply packet");
                    continue;
                }
                Err(err) => return Err(DiscoveryError::Decode(err.to_string())),
            };
            let signed = self.validate(&reply, &nonce)?;
            tracing::debug!(%addr, device = %reply.identity.device_id, signed, "device discovered");
            devices.push(DiscoveredDevice {
                addr,
                identity: reply.identity,
                capabilities: reply.capabilities,
                signed,
            });
        }

        if devices.is_empty() {
            return Err(DiscoveryError::Timeout);
        }
        Ok(devices)
    }

    fn validate(&self, reply: &DiscoveryReply, nonce: &[u8]) -> Result<bool, DiscoveryError> {
        if reply.version != ALPINE_VERSION {
            return Err(DiscoveryError::UnsupportedVersion(reply.version.clone()));
        }
        if reply.nonce != nonce {
            return Err(DiscoveryError::NonceMismatch);
        }
        let Some(verifier) = &self.verifier else {
            return Ok(false);
        };
        match &reply.signature {
            Some(signature) if verifier.verify_challenge(nonce, signature) => Ok(true),
            _ => Err(DiscoveryError::SignatureInvalid),
        }
    }
}

/// Builds discovery replies for a device.
#[derive(Clone)]
pub struct DiscoveryResponder {
    identity: DeviceIdentity,
    capabilities: CapabilitySet,
    signer: Option<Arc<dyn ChallengeAuthenticator>>,
}

impl DiscoveryResponder {
    #[must_use]
    pub fn new(identity: DeviceIdentity, capabilities: CapabilitySet) -> Self {
        Self {
            identity,
            capabilities,
            signer: None,
        }
    }

    /// Sign every reply with `signer`.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn ChallengeAuthenticator>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Answer `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::UnsupportedVersion`] for requests of another
    /// protocol version.
    pub fn reply(&self, request: &DiscoveryRequest) -> Result<DiscoveryReply, DiscoveryError> {
        if request.version != ALPINE_VERSION {
            return Err(DiscoveryError::UnsupportedVersion(request.version.clone()));
        }
        Ok(DiscoveryReply {
            version: ALPINE_VERSION.to_string(),
            nonce: request.nonce.clone(),
            identity: self.identity.clone(),
            capabilities: self.capabilities.clone(),
            signature: self
                .signer
                .as_ref()
                .map(|signer| signer.sign_challenge(&request.nonce)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::StaticKeyAuthenticator;

    fn request() -> DiscoveryRequest {
        DiscoveryRequest {
            version: ALPINE_VERSION.into(),
            nonce: vec![1; NONCE_LEN],
            requested: vec!["identity".into()],
        }
    }

    fn client(verifier: Option<&[u8]>) -> DiscoveryClient {
        let any: SocketAddr = ([127, 0, 0, 1], 0).into();
        let client = DiscoveryClient::new(any, any, Vec::new(), Duration::from_millis(10));
        match verifier {
            Some(secret) => client.with_verifier(Arc::new(StaticKeyAuthenticator::new(secret.to_vec()))),
            None => client,
        }
    }

    #[test]
    fn reply_echoes_nonce() {
        let responder = DiscoveryResponder::new(DeviceIdentity::generate("acme", "bar"), CapabilitySet::default());
        let reply = responder.reply(&request()).expect("reply");
        assert_eq!(reply.nonce, request().nonce);
        assert_eq!(reply.signature, None);
        assert_eq!(client(None).validate(&reply, &request().nonce).ok(), Some(false));
    }

    #[test]
    fn responder_rejects_foreign_version() {
        let responder = DiscoveryResponder::new(DeviceIdentity::generate("acme", "bar"), CapabilitySet::default());
        let mut stale = request();
        stale.version = "2.0".into();
        assert!(matches!(
            responder.reply(&stale),
            Err(DiscoveryError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn mismatched_nonce_is_rejected() {
        let responder = DiscoveryResponder::new(DeviceIdentity::generate("acme", "bar"), CapabilitySet::default());
        let reply = responder.reply(&request()).expect("reply");
        assert!(matches!(
            client(None).validate(&reply, &[2; NONCE_LEN]),
            Err(DiscoveryError::NonceMismatch)
        ));
    }

    #[test]
    fn signed_replies_verify_with_shared_secret() {
        let responder = DiscoveryResponder::new(DeviceIdentity::generate("acme", "bar"), CapabilitySet::default())
            .with_signer(Arc::new(StaticKeyAuthenticator::new(b"rig".to_vec())));
        let reply = responder.reply(&request()).expect("reply");

        assert_eq!(client(Some(b"rig".as_slice())).validate(&reply, &request().nonce).ok(), Some(true));
        assert!(matches!(
            client(Some(b"other".as_slice())).validate(&reply, &request().nonce),
            Err(DiscoveryError::SignatureInvalid)
        ));
    }

    #[tokio::test]
    async fn discover_times_out_without_devices() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let target = silent.local_addr().expect("addr");
        let client = DiscoveryClient::new(
            ([127, 0, 0, 1], 0).into(),
            target,
            Vec::new(),
            Duration::from_millis(50),
        );
        assert!(matches!(client.discover().await, Err(DiscoveryError::Timeout)));
    }
}
