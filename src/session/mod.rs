//! Shared session handle.
//!
//! An [`AlnpSession`] is cloned between the client, its stream and the
//! keepalive task; every clone observes the same state. The handle tracks the
//! lifecycle ([`SessionState`]), the handshake outcome, the bound stream
//! profile and the streaming switches.

mod state;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

pub use state::{SessionState, SessionStateError};

use crate::{
    handshake::{ClientHandshake, HandshakeError, ServerHandshake},
    message::SessionEstablished,
    profile::CompiledStreamProfile,
    stream::JitterStrategy,
    transport::PacketTransport,
};

/// Default lifetime of handshake phases and of silent sessions.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Which end of the session this handle represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlnpRole {
    Controller,
    Node,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    last_keepalive: Instant,
    jitter: Option<JitterStrategy>,
    streaming_enabled: bool,
    established: Option<SessionEstablished>,
    profile: Option<CompiledStreamProfile>,
    profile_locked: bool,
}

/// Cloneable handle to one controller/device session.
#[derive(Clone, Debug)]
pub struct AlnpSession {
    role: AlnpRole,
    inner: Arc<Mutex<SessionInner>>,
    timeout: Duration,
}

impl AlnpSession {
    /// Create a session in [`SessionState::Init`].
    #[must_use]
    pub fn new(role: AlnpRole) -> Self {
        Self {
            role,
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Init,
                last_keepalive: Instant::now(),
                jitter: None,
                streaming_enabled: true,
                established: None,
                profile: None,
                profile_locked: false,
            })),
            timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }

    /// Override the session timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the controller handshake and return a ready session.
    ///
    /// # Errors
    ///
    /// Returns any [`HandshakeError`]; the session is discarded on failure.
    pub async fn connect<T>(
        handshake: &ClientHandshake,
        transport: &mut T,
    ) -> Result<Self, HandshakeError>
    where
        T: PacketTransport + ?Sized,
    {
        let session = Self::new(AlnpRole::Controller);
        session.begin_handshake()?;
        let established = handshake.run(transport).await?;
        session.complete_handshake(established)?;
        Ok(session)
    }

    /// Answer a controller handshake and return a ready session.
    ///
    /// # Errors
    ///
    /// Returns any [`HandshakeError`]; the session is discarded on failure.
    pub async fn accept<T>(
        handshake: &ServerHandshake,
        transport: &mut T,
    ) -> Result<Self, HandshakeError>
    where
        T: PacketTransport + ?Sized,
    {
        let session = Self::new(AlnpRole::Node);
        session.begin_handshake()?;
        let established = handshake.run(transport).await?;
        session.complete_handshake(established)?;
        Ok(session)
    }

    /// Enter [`SessionState::Handshake`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::InvalidTransition`] unless the session is
    /// fresh.
    pub fn begin_handshake(&self) -> Result<(), SessionStateError> {
        self.transition(SessionState::Handshake {
            since: Instant::now(),
        })
    }

    /// Record the handshake outcome and move to [`SessionState::Ready`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::InvalidTransition`] unless a handshake is
    /// in progress.
    pub fn complete_handshake(&self, established: SessionEstablished) -> Result<(), SessionStateError> {
        let mut inner = self.lock();
        let now = Instant::now();
        let next = inner
            .state
            .clone()
            .transition(SessionState::Authenticated { since: now })?
            .transition(SessionState::Ready { since: now })?;
        inner.state = next;
        inner.established = Some(established);
        inner.last_keepalive = now;
        Ok(())
    }

    /// Which end of the session this is.
    #[must_use]
    pub const fn role(&self) -> AlnpRole { self.role }

    /// Configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration { self.timeout }

    /// Handshake outcome, once established.
    #[must_use]
    pub fn established(&self) -> Option<SessionEstablished> { self.lock().established.clone() }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState { self.lock().state.clone() }

    /// Return the handshake outcome if frames may be sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::NotReady`] before the handshake completes,
    /// [`SessionStateError::Failed`] once the session failed, and
    /// [`SessionStateError::MissingEstablished`] if the outcome is absent.
    pub fn ensure_streaming_ready(&self) -> Result<SessionEstablished, SessionStateError> {
        let inner = self.lock();
        match &inner.state {
            state if state.is_streamable() => inner
                .established
                .clone()
                .ok_or(SessionStateError::MissingEstablished),
            SessionState::Failed(reason) => Err(SessionStateError::Failed(reason.clone())),
            other => Err(SessionStateError::NotReady(other.name())),
        }
    }

    /// Note that the peer is alive.
    pub fn update_keepalive(&self) { self.lock().last_keepalive = Instant::now(); }

    /// Fail the session if a handshake phase or the keepalive went stale.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::Timeout`] when the session was failed by
    /// this call.
    pub fn check_timeouts(&self) -> Result<(), SessionStateError> {
        let now = Instant::now();
        let mut inner = self.lock();
        let stale_handshake = inner.state.check_timeout(self.timeout, now);
        let stale_keepalive = inner.state.is_streamable()
            && now.saturating_duration_since(inner.last_keepalive) > self.timeout;
        if stale_handshake || stale_keepalive {
            tracing::warn!(state = inner.state.name(), "session timed out");
            inner.state = SessionState::Failed("session timeout".into());
            return Err(SessionStateError::Timeout);
        }
        Ok(())
    }

    /// Bind a compiled profile to the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionStateError::ProfileLocked`] once streaming started.
    pub fn set_stream_profile(&self, profile: CompiledStreamProfile) -> Result<(), SessionStateError> {
        let mut inner = self.lock();
        if inner.profile_locked {
            return Err(SessionStateError::ProfileLocked);
        }
        inner.profile = Some(profile);
        Ok(())
    }

    /// `config_id` of the bound profile.
    #[must_use]
    pub fn profile_config_id(&self) -> Option<String> {
        self.lock()
            .profile
            .as_ref()
            .map(|profile| profile.config_id().to_string())
    }

    /// Force a jitter strategy instead of deriving it from the profile.
    pub fn set_jitter_strategy(&self, strategy: JitterStrategy) {
        self.lock().jitter = Some(strategy);
    }

    /// Explicit jitter strategy, if one was set.
    #[must_use]
    pub fn jitter_override(&self) -> Option<JitterStrategy> { self.lock().jitter }

    /// Effective jitter strategy: the override, else the profile's, else
    /// [`JitterStrategy::HoldLast`].
    #[must_use]
    pub fn jitter_strategy(&self) -> JitterStrategy {
        let inner = self.lock();
        inner
            .jitter
            .or_else(|| inner.profile.as_ref().map(JitterStrategy::for_profile))
            .unwrap_or(JitterStrategy::HoldLast)
    }

    /// Pause or resume frame transmission.
    pub fn set_streaming_enabled(&self, enabled: bool) { self.lock().streaming_enabled = enabled; }

    /// Whether frame transmission is enabled.
    #[must_use]
    pub fn streaming_enabled(&self) -> bool { self.lock().streaming_enabled }

    /// Enter [`SessionState::Streaming`] and lock the profile.
    ///
    /// Sessions that are not ready keep their state; the profile is locked
    /// regardless.
    pub fn mark_streaming(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, SessionState::Ready { .. }) {
            inner.state = SessionState::Streaming {
                since: Instant::now(),
            };
        }
        inner.profile_locked = true;
    }

    /// Close the session. Terminal states are left untouched.
    pub fn close(&self) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = SessionState::Closed;
        }
    }

    /// Fail the session with `reason`. Terminal states are left untouched.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = SessionState::Failed(reason.into());
        }
    }

    fn transition(&self, next: SessionState) -> Result<(), SessionStateError> {
        let mut inner = self.lock();
        inner.state = inner.state.clone().transition(next)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    use super::*;
    use crate::{
        message::{CapabilitySet, DeviceIdentity},
        profile::StreamProfile,
    };

    fn established() -> SessionEstablished {
        SessionEstablished {
            session_id: Uuid::new_v4(),
            device_identity: DeviceIdentity::generate("acme", "par"),
            capabilities: CapabilitySet::default(),
        }
    }

    #[fixture]
    fn ready() -> AlnpSession {
        let session = AlnpSession::new(AlnpRole::Controller);
        session.begin_handshake().expect("handshake");
        session.complete_handshake(established()).expect("ready");
        session
    }

    #[test]
    fn fresh_session_is_not_streamable() {
        let session = AlnpSession::new(AlnpRole::Node);
        assert_eq!(
            session.ensure_streaming_ready(),
            Err(SessionStateError::NotReady("init"))
        );
    }

    #[rstest]
    fn completed_handshake_allows_streaming(ready: AlnpSession) {
        let established = ready.ensure_streaming_ready().expect("ready");
        assert_eq!(Some(established), ready.established());
        assert_eq!(ready.state().name(), "ready");
    }

    #[rstest]
    fn completing_twice_is_rejected(ready: AlnpSession) {
        assert!(matches!(
            ready.complete_handshake(established()),
            Err(SessionStateError::InvalidTransition { from: "ready", .. })
        ));
    }

    #[rstest]
    fn profile_locks_once_streaming(ready: AlnpSession) {
        let auto = StreamProfile::auto().compile().expect("auto");
        let install = StreamProfile::install().compile().expect("install");
        ready.set_stream_profile(auto.clone()).expect("bind");
        ready.mark_streaming();

        assert_eq!(ready.state().name(), "streaming");
        assert_eq!(
            ready.set_stream_profile(install),
            Err(SessionStateError::ProfileLocked)
        );
        assert_eq!(ready.profile_config_id().as_deref(), Some(auto.config_id()));
    }

    #[rstest]
    fn jitter_override_wins_over_profile(ready: AlnpSession) {
        let install = StreamProfile::install().compile().expect("install");
        ready.set_stream_profile(install).expect("bind");
        assert_eq!(ready.jitter_strategy(), JitterStrategy::Lerp);

        ready.set_jitter_strategy(JitterStrategy::Drop);
        assert_eq!(ready.jitter_strategy(), JitterStrategy::Drop);
    }

    #[rstest]
    fn stale_keepalive_fails_session(ready: AlnpSession) {
        let session = ready.with_timeout(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(session.check_timeouts(), Err(SessionStateError::Timeout));
        assert!(matches!(
            session.ensure_streaming_ready(),
            Err(SessionStateError::Failed(reason)) if reason == "session timeout"
        ));
    }

    #[test]
    fn stalled_handshake_fails_session() {
        let session = AlnpSession::new(AlnpRole::Node).with_timeout(Duration::from_millis(50));
        assert_eq!((session.role(), session.timeout()), (AlnpRole::Node, Duration::from_millis(50)));
        session.begin_handshake().expect("handshake");
        assert_eq!(session.check_timeouts(), Ok(()));

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(session.check_timeouts(), Err(SessionStateError::Timeout));
        assert_eq!(session.state(), SessionState::Failed("session timeout".into()));
    }

    #[rstest]
    fn close_is_terminal(ready: AlnpSession) {
        ready.close();
        ready.fail("late failure");
        assert_eq!(ready.state(), SessionState::Closed);
    }

    #[test]
    fn clones_share_state() {
        let session = AlnpSession::new(AlnpRole::Controller);
        let clone = session.clone();
        clone.set_streaming_enabled(false);
        assert!(!session.streaming_enabled());
    }
}
