//! Shared server context.
//!
//! One [`ServerContext`] holds everything the tool handlers need: the
//! immutable config snapshot, the compiled policy engine, the session
//! registry, and the pending prompt table. No global state -- tests build
//! a fresh context per case.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use bosun_policy::PolicyEngine;
use bosun_session::{PendingPrompts, SessionRegistry};
use bosun_types::{BosunError, Config};

/// The context record threaded through every tool handler.
pub struct ServerContext {
    pub config: Arc<Config>,
    pub policy: PolicyEngine,
    pub registry: Arc<SessionRegistry>,
    pub prompts: Arc<PendingPrompts>,
}

impl ServerContext {
    /// Build the context from a loaded config.
    ///
    /// Policy patterns compile here; a malformed operator pattern is a
    /// fatal configuration error before any request is served.
    pub fn new(config: Config) -> Result<Self, BosunError> {
        let policy = PolicyEngine::new(config.permissibility, &config.policy)?;
        let registry = Arc::new(SessionRegistry::new(
            config.limits.max_sessions,
            config.limits.idle_ttl(),
        ));
        let prompts = Arc::new(PendingPrompts::new(Duration::from_secs(
            config.limits.pending_prompt_ttl_secs,
        )));
        Ok(Self {
            config: Arc::new(config),
            policy,
            registry,
            prompts,
        })
    }

    /// Spawn the background maintenance loop: idle session eviction and
    /// expired prompt cleanup on the configured tick.
    pub fn start_maintenance(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let ctx = self;
        let tick = Duration::from_secs(ctx.config.limits.eviction_tick_secs.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }
                for session in ctx.registry.evict_idle() {
                    session.disconnect().await;
                }
                let purged = ctx.prompts.purge_expired();
                if purged > 0 {
                    debug!(purged, "expired password prompts dropped");
                }
            }
        })
    }

    /// Disconnect every live session, for orderly shutdown.
    pub async fn shutdown(&self) {
        for session in self.registry.drain() {
            session.disconnect().await;
        }
    }
}
