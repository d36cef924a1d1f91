//! Session lifecycle state machine.

use std::time::{Duration, Instant};

/// Lifecycle of an [`AlnpSession`](super::AlnpSession).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Handshake { since: Instant },
    Authenticated { since: Instant },
    Ready { since: Instant },
    Streaming { since: Instant },
    Failed(String),
    Closed,
}

/// Errors raised by session state checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStateError {
    /// The requested transition is not in the lifecycle table.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    /// The session is not ready to stream.
    #[error("session not ready; streaming blocked (state: {0})")]
    NotReady(&'static str),
    /// The session has failed.
    #[error("session failed: {0}")]
    Failed(String),
    /// The session is ready but holds no handshake outcome.
    #[error("session missing even though state is ready")]
    MissingEstablished,
    /// The stream profile is locked once streaming starts.
    #[error("stream profile cannot be changed after streaming starts")]
    ProfileLocked,
    /// The session exceeded its timeout.
    #[error("session timeout")]
    Timeout,
}

impl SessionState {
    /// Short state name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Handshake { .. } => "handshake",
            Self::Authenticated { .. } => "authenticated",
            Self::Ready { .. } => "ready",
            Self::Streaming { .. } => "streaming",
            Self::Failed(_) => "failed",
            Self::Closed => "closed",
        }
    }

    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool { matches!(self, Self::Failed(_) | Self::Closed) }

    /// Whether frames may be sent in this state.
    #[must_use]
    pub const fn is_streamable(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Streaming { .. })
    }

    /// Validate a move to `next`, returning the new state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::InvalidTransition`] for moves outside the
    /// lifecycle table.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Instant;
    ///
    /// use alpine_sdk::SessionState;
    ///
    /// let handshake = SessionState::Init
    ///     .transition(SessionState::Handshake { since: Instant::now() })
    ///     .expect("init may start a handshake");
    /// assert!(handshake.transition(SessionState::Streaming { since: Instant::now() }).is_err());
    /// ```
    pub fn transition(self, next: Self) -> Result<Self, SessionStateError> {
        let allowed = match (&self, &next) {
            (Self::Init, Self::Handshake { .. })
            | (Self::Handshake { .. }, Self::Authenticated { .. })
            | (Self::Authenticated { .. }, Self::Ready { .. })
            | (Self::Ready { .. }, Self::Streaming { .. }) => true,
            (current, Self::Failed(_) | Self::Closed) => !current.is_terminal(),
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(SessionStateError::InvalidTransition {
                from: self.name(),
                to: next.name(),
            })
        }
    }

    /// Whether a handshake phase has outlived `timeout` at `now`.
    #[must_use]
    pub fn check_timeout(&self, timeout: Duration, now: Instant) -> bool {
        match self {
            Self::Handshake { since } | Self::Authenticated { since } => {
                now.saturating_duration_since(*since) > timeout
            }
            _ => false,
        }
    }
}
