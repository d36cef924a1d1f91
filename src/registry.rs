//! Registry of device-side sessions.
//!
//! `SessionRegistry` maps each controller address to the state a device keeps
//! for it: the session handle, the control responder and the network
//! conditions observed on its frames. Stale sessions are pruned
//! opportunistically from a maintenance tick.
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{control::ControlResponder, session::AlnpSession, stream::NetworkConditions};

/// State a device keeps for one controller.
#[derive(Debug)]
pub struct PeerSession {
    session: AlnpSession,
    session_id: Uuid,
    responder: Mutex<ControlResponder>,
    conditions: Mutex<NetworkConditions>,
}

impl PeerSession {
    /// Wrap an established session.
    #[must_use]
    pub fn new(session: AlnpSession, session_id: Uuid) -> Self {
        Self {
            session,
            session_id,
            responder: Mutex::new(ControlResponder::new(session_id)),
            conditions: Mutex::new(NetworkConditions::new()),
        }
    }

    #[must_use]
    pub fn session(&self) -> &AlnpSession { &self.session }

    #[must_use]
    pub const fn session_id(&self) -> Uuid { self.session_id }

    /// Lock the control responder.
    pub fn responder(&self) -> MutexGuard<'_, ControlResponder> {
        self.responder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the network conditions tracker.
    pub fn conditions(&self) -> MutexGuard<'_, NetworkConditions> {
        self.conditions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Concurrent registry of peer sessions keyed by controller address.
#[derive(Debug, Default)]
pub struct SessionRegistry(DashMap<SocketAddr, Arc<PeerSession>>);

impl SessionRegistry {
    /// Retrieve the session for `peer`, if any.
    pub fn get(&self, peer: &SocketAddr) -> Option<Arc<PeerSession>> {
        self.0.get(peer).map(|entry| Arc::clone(entry.value()))
    }

    /// Register a session, returning any session it replaces.
    pub fn insert(&self, peer: SocketAddr, session: PeerSession) -> Option<Arc<PeerSession>> {
        self.0.insert(peer, Arc::new(session))
    }

    /// Remove a session, typically when the controller closes it.
    pub fn remove(&self, peer: &SocketAddr) -> Option<Arc<PeerSession>> {
        self.0.remove(peer).map(|(_, session)| session)
    }

    /// Fail sessions whose keepalive went stale and drop every terminal one.
    ///
    /// `DashMap::retain` acquires per-bucket write locks, so other operations
    /// may contend briefly while the registry is pruned. Returns the number of
    /// sessions removed.
    pub fn prune(&self) -> usize {
        let before = self.0.len();
        self.0.retain(|peer, entry| {
            if entry.session.check_timeouts().is_err() {
                tracing::info!(%peer, session_id = %entry.session_id, "session expired");
            }
            !entry.session.state().is_terminal()
        });
        before.saturating_sub(self.0.len())
    }

    /// Addresses of the registered controllers.
    #[must_use]
    pub fn active_peers(&self) -> Vec<SocketAddr> { self.0.iter().map(|entry| *entry.key()).collect() }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        message::{CapabilitySet, DeviceIdentity, SessionEstablished},
        session::AlnpRole,
    };

    #[expect(
        unused_braces,
        reason = "rustc false positive for single-line rstest fixtures"
    )]
    #[fixture]
    fn registry() -> SessionRegistry { SessionRegistry::default() }

    fn peer(port: u16) -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], port)) }

    fn ready_session(timeout: Duration) -> PeerSession {
        let session_id = Uuid::new_v4();
        let session = AlnpSession::new(AlnpRole::Node).with_timeout(timeout);
        session.begin_handshake().expect("handshake");
        session
            .complete_handshake(SessionEstablished {
                session_id,
                device_identity: DeviceIdentity::generate("acme", "node"),
                capabilities: CapabilitySet::default(),
            })
            .expect("ready");
        PeerSession::new(session, session_id)
    }

    #[rstest]
    fn sessions_are_found_by_peer(registry: SessionRegistry) {
        let entry = ready_session(Duration::from_secs(10));
        let id = entry.session_id();
        assert!(registry.insert(peer(1), entry).is_none());
        assert_eq!(registry.get(&peer(1)).map(|s| s.session_id()), Some(id));
        assert!(registry.get(&peer(2)).is_none());
    }

    #[rstest]
    fn prune_drops_closed_and_stale_sessions(registry: SessionRegistry) {
        registry.insert(peer(1), ready_session(Duration::from_secs(10)));
        registry.insert(peer(2), ready_session(Duration::ZERO));
        let closed = ready_session(Duration::from_secs(10));
        closed.session().close();
        registry.insert(peer(3), closed);
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(registry.prune(), 2);
        assert_eq!(registry.active_peers(), vec![peer(1)]);
    }

    #[rstest]
    fn remove_returns_entry(registry: SessionRegistry) {
        registry.insert(peer(7), ready_session(Duration::from_secs(10)));
        assert!(registry.remove(&peer(7)).is_some());
        assert!(registry.is_empty());
    }
}
