//! Result post-processing pipeline.
//!
//! Every tool result flows through the registered middlewares before it is
//! written back to the client. [`SecretRedactor`] guarantees no configured
//! secret ever appears in a response body; [`AuditLog`] records each call.

use async_trait::async_trait;
use tracing::info;

use bosun_types::secret::{SecretString, redact_all};

use crate::rpc::{CallToolResult, ContentBlock};

/// Composable post-processing hook for tool results.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect or rewrite a result after execution.
    async fn after_call(&self, tool: &str, result: CallToolResult) -> CallToolResult;
}

/// Rewrites configured secret values to `[REDACTED]` in every outgoing
/// content block.
pub struct SecretRedactor {
    secrets: Vec<SecretString>,
}

impl SecretRedactor {
    pub fn new(secrets: Vec<SecretString>) -> Self {
        Self { secrets }
    }
}

#[async_trait]
impl Middleware for SecretRedactor {
    async fn after_call(&self, _tool: &str, mut result: CallToolResult) -> CallToolResult {
        let refs: Vec<&SecretString> = self.secrets.iter().collect();
        for block in &mut result.content {
            let ContentBlock::Text { text } = block;
            let scrubbed = redact_all(text, &refs);
            *text = scrubbed;
        }
        result
    }
}

/// Logs every completed tool call at `info!` level.
pub struct AuditLog;

#[async_trait]
impl Middleware for AuditLog {
    async fn after_call(&self, tool: &str, result: CallToolResult) -> CallToolResult {
        info!(tool, is_error = result.is_error, "tool call complete");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redactor_scrubs_every_block() {
        let mw = SecretRedactor::new(vec![SecretString::new("hunter2")]);
        let result = CallToolResult::text("stdout said hunter2 twice: hunter2");
        let scrubbed = mw.after_call("ssh_run", result).await;
        let ContentBlock::Text { text } = &scrubbed.content[0];
        assert!(!text.contains("hunter2"));
        assert_eq!(text.matches("[REDACTED]").count(), 2);
    }

    #[tokio::test]
    async fn redactor_with_no_secrets_is_identity() {
        let mw = SecretRedactor::new(Vec::new());
        let result = CallToolResult::text("plain output");
        let out = mw.after_call("ssh_run", result.clone()).await;
        assert_eq!(out, result);
    }
}
