//! Process-wide pending password prompt table.
//!
//! When the interposer surfaces a prompt it cannot answer and interactive
//! mode is on, the command loop registers a [`PromptRequest`] here and
//! suspends on the returned receiver. `ssh_provide_password` resolves the
//! request, `ssh_cancel_password_request` rejects it, and expiry sweeps
//! drop requests past their deadline (dropping the sender wakes the
//! waiter empty-handed).

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::oneshot;
use tracing::{debug, info};

use bosun_types::secret::SecretString;
use bosun_types::{PromptKind, PromptRequest};

struct Pending {
    request: PromptRequest,
    tx: oneshot::Sender<Option<SecretString>>,
}

/// Mutex-protected map of unanswered prompts.
pub struct PendingPrompts {
    ttl: Duration,
    inner: Mutex<HashMap<String, Pending>>,
}

impl PendingPrompts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// How long a registered prompt stays answerable.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a prompt and return the request record plus the receiver
    /// the command loop suspends on.
    pub fn register(
        &self,
        session_id: &str,
        kind: PromptKind,
        prompt_text: &str,
    ) -> (PromptRequest, oneshot::Receiver<Option<SecretString>>) {
        let now = Utc::now();
        let ttl = chrono::TimeDelta::from_std(self.ttl).unwrap_or(chrono::TimeDelta::seconds(60));
        let (tx, rx) = oneshot::channel();

        let mut inner = self.inner.lock();
        let request_id = loop {
            let candidate: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(12)
                .map(char::from)
                .collect();
            if !inner.contains_key(&candidate) {
                break candidate;
            }
        };

        let request = PromptRequest {
            request_id: request_id.clone(),
            session_id: session_id.to_string(),
            prompt_text: prompt_text.to_string(),
            prompt_kind: kind,
            created_at: now,
            deadline_at: now + ttl,
        };
        info!(request_id = %request_id, session_id, kind = ?kind, "password prompt pending");
        inner.insert(request_id, Pending { request: request.clone(), tx });
        (request, rx)
    }

    /// Resolve a pending prompt with the given secret.
    pub fn resolve(&self, request_id: &str, password: SecretString) -> bool {
        let Some(pending) = self.inner.lock().remove(request_id) else {
            return false;
        };
        debug!(request_id, "password prompt resolved");
        // The waiter may already have timed out; that is not our problem.
        let _ = pending.tx.send(Some(password));
        true
    }

    /// Cancel a pending prompt; the waiting command fails promptly.
    pub fn cancel(&self, request_id: &str) -> bool {
        let Some(pending) = self.inner.lock().remove(request_id) else {
            return false;
        };
        debug!(request_id, "password prompt cancelled");
        let _ = pending.tx.send(None);
        true
    }

    /// Remove a prompt without signalling, used when the waiter itself
    /// gave up (deadline or command timeout).
    pub fn forget(&self, request_id: &str) {
        self.inner.lock().remove(request_id);
    }

    /// Snapshot of every pending prompt.
    pub fn list(&self) -> Vec<PromptRequest> {
        let mut requests: Vec<PromptRequest> = self
            .inner
            .lock()
            .values()
            .map(|p| p.request.clone())
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        requests
    }

    /// Drop every prompt past its deadline; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let before = inner.len();
        inner.retain(|_, pending| pending.request.deadline_at > now);
        before - inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PendingPrompts {
        PendingPrompts::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn resolve_delivers_the_secret_to_the_waiter() {
        let prompts = table();
        let (request, rx) = prompts.register("sess1", PromptKind::Sudo, "[sudo] password:");
        assert!(prompts.resolve(&request.request_id, SecretString::new("hunter2")));

        let delivered = rx.await.unwrap().unwrap();
        assert_eq!(delivered.expose(), "hunter2");
        assert!(prompts.list().is_empty());
    }

    #[tokio::test]
    async fn cancel_delivers_none() {
        let prompts = table();
        let (request, rx) = prompts.register("sess1", PromptKind::Generic, "Password:");
        assert!(prompts.cancel(&request.request_id));
        assert_eq!(rx.await.unwrap(), None);
    }

    #[test]
    fn unknown_request_ids_are_reported() {
        let prompts = table();
        assert!(!prompts.resolve("missing", SecretString::new("x")));
        assert!(!prompts.cancel("missing"));
    }

    #[tokio::test]
    async fn purge_drops_expired_and_wakes_waiters() {
        let prompts = PendingPrompts::new(Duration::from_secs(0));
        let (_request, rx) = prompts.register("sess1", PromptKind::Sudo, "p:");
        // TTL zero means the deadline is already past.
        assert_eq!(prompts.purge_expired(), 1);
        // Sender dropped: the waiter observes closure, not a secret.
        assert!(rx.await.is_err());
    }

    #[test]
    fn list_is_ordered_by_creation() {
        let prompts = table();
        let (first, _rx1) = prompts.register("a", PromptKind::Sudo, "p1");
        let (second, _rx2) = prompts.register("b", PromptKind::Ssh, "p2");
        let listed = prompts.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].request_id, first.request_id);
        assert_eq!(listed[1].request_id, second.request_id);
    }
}
