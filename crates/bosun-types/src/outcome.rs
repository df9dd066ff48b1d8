//! Wire-visible result types shared by the session runtime and the
//! tool dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of executing one command on a session.
///
/// `exit_status` is `None` whenever a cap fired (timeout, byte, or line),
/// the command was denied, or the run was interrupted -- it is `Some` only
/// when the exit-status trailer was actually parsed from the channel.
///
/// Under a PTY the remote merges stderr into the interactive stream, so
/// `stderr` carries SSH extended-data bytes only when the remote sends
/// them out of band (rare in practice).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured extended-data output (lossy UTF-8).
    pub stderr: String,
    /// Remote exit status, when recovered.
    pub exit_status: Option<i32>,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Whether a byte or line cap stopped the capture.
    pub truncated: bool,
    /// Whether the wall-clock deadline expired.
    pub timeout: bool,
    /// Policy denial reason, when the command never reached the channel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,
}

impl ExecutionOutcome {
    /// An outcome for a command rejected before any channel I/O.
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            denied_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// One row of `ssh_list_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Opaque session id.
    pub id: String,
    /// Remote host.
    pub host: String,
    /// Login user.
    pub user: String,
    /// When the session was established.
    pub created_at: DateTime<Utc>,
    /// When the session last executed a command or transfer.
    pub last_used_at: DateTime<Utc>,
    /// Seconds since `last_used_at`.
    pub idle_for: u64,
}

/// What kind of authentication prompt the interposer recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// `[sudo] password for ...:` and friends.
    Sudo,
    /// Remote ssh client prompts (`user@host's password:`, host authenticity).
    Ssh,
    /// A bare `Password:` with no disambiguating command context.
    Generic,
}

/// A pending, externally resolvable request for a secret.
///
/// Registered when the interposer surfaces a prompt it cannot answer and
/// interactive mode is on. Expires after the pending-prompt TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    /// Opaque request id, passed back via `ssh_provide_password`.
    pub request_id: String,
    /// The session whose command is waiting.
    pub session_id: String,
    /// The prompt text as seen on the channel.
    pub prompt_text: String,
    /// Classification of the prompt.
    pub prompt_kind: PromptKind,
    /// When the prompt was registered.
    pub created_at: DateTime<Utc>,
    /// When the prompt expires unanswered.
    pub deadline_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_outcome_has_no_exit_status() {
        let out = ExecutionOutcome::denied("command not allowed: rm");
        assert_eq!(out.exit_status, None);
        assert!(out.stdout.is_empty());
        assert_eq!(out.denied_reason.as_deref(), Some("command not allowed: rm"));
    }

    #[test]
    fn outcome_skips_absent_denied_reason() {
        let out = ExecutionOutcome::default();
        let json = serde_json::to_string(&out).unwrap();
        assert!(!json.contains("denied_reason"));
    }

    #[test]
    fn prompt_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&PromptKind::Sudo).unwrap(), "\"sudo\"");
        assert_eq!(
            serde_json::to_string(&PromptKind::Generic).unwrap(),
            "\"generic\""
        );
    }
}
