//! Session registry: ownership, lookup, and idle eviction.
//!
//! The registry exclusively owns every live session. Handlers borrow an
//! `Arc` for the duration of one call; removal (explicit disconnect, idle
//! eviction, shutdown drain) goes through [`SessionRegistry::remove`] so a
//! session never reaches back into the registry itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info};

use bosun_types::SessionSummary;

use crate::error::SessionError;
use crate::session::SshSession;

/// Mutex-protected map from session id to live session.
pub struct SessionRegistry {
    max_sessions: usize,
    idle_ttl: Duration,
    inner: Mutex<HashMap<String, Arc<SshSession>>>,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            max_sessions,
            idle_ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Draw a fresh url-safe session id, retrying on collision.
    pub fn new_id(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let candidate: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            if !inner.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Whether the registry still has room. Connection setup is slow, so
    /// callers check this before dialing; [`SessionRegistry::insert`]
    /// re-checks atomically.
    pub fn has_capacity(&self) -> bool {
        self.inner.lock().len() < self.max_sessions
    }

    /// Register a freshly connected session.
    pub fn insert(&self, session: Arc<SshSession>) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.len() >= self.max_sessions {
            return Err(SessionError::MaxSessions(inner.len()));
        }
        let id = session.id().to_string();
        if inner.contains_key(&id) {
            return Err(SessionError::DuplicateId(id));
        }
        info!(session_id = %id, host = %session.host(), "session registered");
        inner.insert(id, session);
        Ok(())
    }

    /// Look up a live session.
    pub fn get(&self, id: &str) -> Option<Arc<SshSession>> {
        self.inner.lock().get(id).cloned()
    }

    /// Remove a session from the registry. The caller is responsible for
    /// disconnecting it.
    pub fn remove(&self, id: &str) -> Option<Arc<SshSession>> {
        let removed = self.inner.lock().remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "session removed from registry");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Summaries of every live session, oldest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .inner
            .lock()
            .values()
            .map(|s| s.summary())
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Remove and return every session idle past the TTL.
    pub fn evict_idle(&self) -> Vec<Arc<SshSession>> {
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .iter()
            .filter(|(_, s)| s.idle_for() > self.idle_ttl)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| {
                info!(session_id = %id, "evicting idle session");
                inner.remove(&id)
            })
            .collect()
    }

    /// Remove and return every session, for shutdown.
    pub fn drain(&self) -> Vec<Arc<SshSession>> {
        let mut inner = self.inner.lock();
        inner.drain().map(|(_, s)| s).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_urlsafe_and_long_enough() {
        let registry = SessionRegistry::new(5, Duration::from_secs(60));
        let id = registry.new_id();
        assert!(id.len() >= 9);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, registry.new_id());
    }

    #[test]
    fn empty_registry_has_capacity_and_no_sessions() {
        let registry = SessionRegistry::new(2, Duration::from_secs(60));
        assert!(registry.has_capacity());
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("missing").is_none());
        assert!(registry.remove("missing").is_none());
        assert!(registry.list().is_empty());
        assert!(registry.evict_idle().is_empty());
    }
}
