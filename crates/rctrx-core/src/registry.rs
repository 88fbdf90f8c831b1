//! Session registry.
//!
//! An index-stable arena of open sessions keyed by a monotonically
//! assigned id. Closing a session removes its entry without disturbing any
//! other handle; iteration order is unspecified.

use crate::error::TransceiverError;
use crate::session::{Session, SessionId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// How many session handles may be open at once.
pub const DEFAULT_MAX_SESSIONS: usize = 32;

#[derive(Debug)]
pub(crate) struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    next_id: AtomicU32,
    max_sessions: usize,
}

impl SessionRegistry {
    pub(crate) fn new(max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU32::new(0),
            max_sessions,
        }
    }

    /// Allocate and register a new session.
    pub(crate) fn open(&self) -> Result<Arc<Session>, TransceiverError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(TransceiverError::TooManySessions(self.max_sessions));
        }
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id));
        self.sessions.insert(id, Arc::clone(&session));
        debug!(session = %id, open = self.sessions.len(), "Session opened");
        Ok(session)
    }

    /// Drop a session from the arena.
    pub(crate) fn remove(&self, id: SessionId) {
        if self.sessions.remove(&id).is_some() {
            debug!(session = %id, open = self.sessions.len(), "Session closed");
        }
    }

    /// Number of open sessions.
    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of all open sessions, in unspecified order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_limit() {
        let registry = SessionRegistry::new(2);
        let a = registry.open().unwrap();
        let _b = registry.open().unwrap();
        assert_eq!(
            registry.open().unwrap_err(),
            TransceiverError::TooManySessions(2)
        );

        // closing frees a slot
        registry.remove(a.id());
        assert!(registry.open().is_ok());
    }

    #[test]
    fn test_ids_stay_stable_across_removal() {
        let registry = SessionRegistry::new(8);
        let a = registry.open().unwrap();
        let b = registry.open().unwrap();
        registry.remove(a.id());

        let ids: Vec<SessionId> = registry.snapshot().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![b.id()]);

        // removing again is a no-op
        registry.remove(a.id());
        assert_eq!(registry.len(), 1);
    }
}
