//! Control plane.
//!
//! Control requests travel as [`ControlEnvelope`]s bound to a session and a
//! sequence number. [`ReliableControlChannel`] retransmits each envelope with
//! exponential backoff until the device acknowledges it, and
//! [`ControlResponder`] is the device-side check against foreign sessions and
//! replays.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::{
    message::{Acknowledge, ControlEnvelope, ControlOp, Packet},
    transport::{PacketTransport, TransportError},
};

/// Errors raised by the control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The underlying transport failed.
    #[error("control transport error: {0}")]
    Transport(#[from] TransportError),
    /// No acknowledgement arrived within the attempt budget.
    #[error("control channel retransmit limit exceeded after {attempts} attempts")]
    RetransmitLimit { attempts: u32 },
    /// The envelope belongs to another session.
    #[error("control envelope for session {received}, expected {expected}")]
    SessionMismatch { expected: Uuid, received: Uuid },
    /// The sequence number was already accepted.
    #[error("replayed control sequence {seq} (last accepted {last})")]
    Replay { seq: u64, last: u64 },
}

/// Builds control envelopes for one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlClient {
    device_id: String,
    session_id: Uuid,
}

impl ControlClient {
    #[must_use]
    pub fn new(device_id: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            device_id: device_id.into(),
            session_id,
        }
    }

    /// Device the session was established with.
    #[must_use]
    pub fn device_id(&self) -> &str { &self.device_id }

    #[must_use]
    pub const fn session_id(&self) -> Uuid { self.session_id }

    /// Build an envelope without sending it.
    #[must_use]
    pub fn envelope(&self, seq: u64, op: ControlOp, payload: Vec<u8>) -> ControlEnvelope {
        ControlEnvelope {
            session_id: self.session_id,
            seq,
            op,
            payload,
        }
    }

    /// Send `op` through `channel` and wait for its acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns any [`ControlError`] raised by the channel.
    pub async fn send<T>(
        &self,
        channel: &mut ReliableControlChannel<T>,
        op: ControlOp,
        payload: Vec<u8>,
    ) -> Result<Acknowledge, ControlError>
    where
        T: PacketTransport,
    {
        let seq = channel.next_seq();
        channel.send_reliable(self.envelope(seq, op, payload)).await
    }
}

/// Retransmitting request/acknowledge exchange over a [`PacketTransport`].
///
/// Attempt `n` waits `base_timeout * 2^(n-1)` for an acknowledgement with a
/// matching sequence number. A keepalive from the peer proves it is alive and
/// resets the attempt count. Unrelated packets are ignored.
#[derive(Debug)]
pub struct ReliableControlChannel<T> {
    transport: T,
    seq: u64,
    max_attempts: u32,
    base_timeout: Duration,
}

impl<T> ReliableControlChannel<T> {
    /// Default number of transmissions before giving up.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    /// Default wait for the first attempt.
    pub const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_millis(200);
    /// Longest wait for any single attempt.
    pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            seq: 0,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_timeout: Self::DEFAULT_BASE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    /// Reserve the next sequence number. Sequences start at 1.
    pub fn next_seq(&mut self) -> u64 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    /// Wait for attempt `attempt`, doubling from the base and capped at
    /// [`MAX_ATTEMPT_TIMEOUT`](Self::MAX_ATTEMPT_TIMEOUT) or the base,
    /// whichever is larger.
    fn attempt_timeout(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let cap = Self::MAX_ATTEMPT_TIMEOUT.max(self.base_timeout);
        self.base_timeout
            .checked_mul(factor)
            .map_or(cap, |timeout| timeout.min(cap))
    }
}

impl<T: PacketTransport> ReliableControlChannel<T> {
    /// Send `envelope` until it is acknowledged.
    ///
    /// A negative acknowledgement is returned to the caller as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::RetransmitLimit`] once the attempt budget is
    /// exhausted and [`ControlError::Transport`] if sending fails.
    pub async fn send_reliable(&mut self, envelope: ControlEnvelope) -> Result<Acknowledge, ControlError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.transport
                .send(Packet::Control(envelope.clone()))
                .await?;
            let deadline = Instant::now() + self.attempt_timeout(attempt);

            loop {
                match time::timeout_at(deadline, self.transport.recv()).await {
                    Ok(Ok(Packet::Ack(ack))) if ack.seq == envelope.seq => return Ok(ack),
                    Ok(Ok(Packet::Keepalive(_))) => attempt = 0,
                    Ok(Ok(other)) => {
                        tracing::trace!(kind = other.kind(), "ignoring packet while awaiting ack");
                    }
                    Ok(Err(TransportError::Decode(err))) => {
                        tracing::debug!(error = %err, "undecodable packet while awaiting ack");
                    }
                    Ok(Err(TransportError::Timeout)) | Err(_) => break,
                    Ok(Err(err)) => return Err(err.into()),
                }
            }

            if attempt >= self.max_attempts {
                return Err(ControlError::RetransmitLimit {
                    attempts: self.max_attempts,
                });
            }
            tracing::debug!(seq = envelope.seq, attempt, "retransmitting control envelope");
        }
    }
}

#[async_trait]
impl<T: PacketTransport> PacketTransport for ReliableControlChannel<T> {
    async fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.transport.send(packet).await
    }

    async fn recv(&mut self) -> Result<Packet, TransportError> { self.transport.recv().await }
}

/// Device-side validation of control envelopes.
///
/// The last acknowledgement is kept so a retransmitted envelope can be
/// answered again without running the operation twice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlResponder {
    session_id: Uuid,
    last_seq: u64,
    last_ack: Option<Acknowledge>,
}

impl ControlResponder {
    #[must_use]
    pub const fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            last_seq: 0,
            last_ack: None,
        }
    }

    /// Accept `envelope` if it belongs to this session and is not a replay.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::SessionMismatch`] or [`ControlError::Replay`].
    ///
    /// # Examples
    ///
    /// ```
    /// use alpine_sdk::{ControlClient, ControlOp, ControlResponder};
    /// use uuid::Uuid;
    ///
    /// let session = Uuid::new_v4();
    /// let client = ControlClient::new("device", session);
    /// let mut responder = ControlResponder::new(session);
    /// let envelope = client.envelope(1, ControlOp::Identify, Vec::new());
    /// assert!(responder.verify(&envelope).is_ok());
    /// assert!(responder.verify(&envelope).is_err());
    /// ```
    pub fn verify(&mut self, envelope: &ControlEnvelope) -> Result<(), ControlError> {
        if envelope.session_id != self.session_id {
            return Err(ControlError::SessionMismatch {
                expected: self.session_id,
                received: envelope.session_id,
            });
        }
        if envelope.seq <= self.last_seq {
            return Err(ControlError::Replay {
                seq: envelope.seq,
                last: self.last_seq,
            });
        }
        self.last_seq = envelope.seq;
        Ok(())
    }

    /// Build an acknowledgement for `seq`.
    #[must_use]
    pub const fn ack(&self, seq: u64, ok: bool, detail: Option<String>) -> Acknowledge {
        Acknowledge {
            session_id: self.session_id,
            seq,
            ok,
            detail,
        }
    }

    /// Keep `ack` for answering retransmissions.
    pub fn remember(&mut self, ack: Acknowledge) { self.last_ack = Some(ack); }

    /// Acknowledgement previously sent for `seq`, if it was the latest one.
    #[must_use]
    pub fn cached_ack(&self, seq: u64) -> Option<&Acknowledge> {
        self.last_ack.as_ref().filter(|ack| ack.seq == seq)
    }

    /// Highest sequence accepted so far.
    #[must_use]
    pub const fn last_seq(&self) -> u64 { self.last_seq }
}
