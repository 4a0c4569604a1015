// ABOUTME: Table of accepted sessions plus a system_id index for deliver_sm routing
// ABOUTME: Sessions are inserted on accept, indexed on bind, and removed on close

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::session::{Session, SessionId};

struct RegistryInner {
    sessions: HashMap<SessionId, Session>,
    /// One system_id may hold several binds (e.g. a transmitter and a
    /// receiver session side by side).
    by_system_id: HashMap<String, Vec<SessionId>>,
}

/// Session registry. Locked only for O(1) bookkeeping; no await points
/// ever hold the lock.
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                by_system_id: HashMap::new(),
            }),
        }
    }

    pub fn insert(&self, session: Session) {
        let mut inner = self.inner.lock().expect("registry lock");
        debug!(session = %session.id(), "session registered");
        inner.sessions.insert(session.id(), session);
    }

    /// Index a session under its peer's system_id once it has bound.
    pub fn bind(&self, id: SessionId, system_id: &str) {
        let mut inner = self.inner.lock().expect("registry lock");
        if inner.sessions.contains_key(&id) {
            inner
                .by_system_id
                .entry(system_id.to_string())
                .or_default()
                .push(id);
        }
    }

    pub fn remove(&self, id: SessionId) -> Option<Session> {
        let mut inner = self.inner.lock().expect("registry lock");
        let session = inner.sessions.remove(&id);
        if session.is_some() {
            debug!(session = %id, "session deregistered");
            inner.by_system_id.retain(|_, ids| {
                ids.retain(|&other| other != id);
                !ids.is_empty()
            });
        }
        session
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock").sessions.len()
    }

    pub fn all(&self) -> Vec<Session> {
        self.inner
            .lock()
            .expect("registry lock")
            .sessions
            .values()
            .cloned()
            .collect()
    }

    /// A session for `system_id` whose peer is bound for receive
    /// (BoundRx or BoundTrx), if any.
    pub fn find_receiver(&self, system_id: &str) -> Option<Session> {
        let inner = self.inner.lock().expect("registry lock");
        let ids = inner.by_system_id.get(system_id)?;
        ids.iter()
            .filter_map(|id| inner.sessions.get(id))
            .find(|session| {
                matches!(
                    session.state(),
                    crate::session::SessionState::BoundRx | crate::session::SessionState::BoundTrx
                )
            })
            .cloned()
    }
}
