//! Error types for the bosun SSH command broker.
//!
//! [`ErrorKind`] is the wire-visible error taxonomy carried in the
//! `{success: false, error, details}` response envelope. [`BosunError`] is
//! the process-level error used during startup and configuration loading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-visible error kinds surfaced to the agent.
///
/// Serialized in `snake_case` inside the error envelope. `Timeout` and
/// `Truncated` are deliberately absent: they ride inside the execution
/// outcome because partial output is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid tier, bad regex, unreachable key file. Fatal at startup.
    ConfigError,
    /// The request itself is malformed (missing or mistyped parameter).
    InvalidRequest,
    /// Every authentication method was rejected by the remote.
    AuthFailed,
    /// The transport could not be established.
    NetworkUnreachable,
    /// The remote presented a key that differs from the recorded one.
    HostKeyMismatch,
    /// The transport did not come up within the connect timeout.
    ConnectTimeout,
    /// Unknown session id or prompt request id.
    NotFound,
    /// The registry is at its concurrent session cap.
    MaxSessionsReached,
    /// A command is already executing on this session.
    BusySession,
    /// Policy rejected the command before any channel I/O.
    Denied,
    /// A password prompt surfaced and was not resolved within the window.
    PasswordRequired,
    /// Terminal channel or transport failure mid-command.
    SessionBroken,
    /// The session was disconnected while a command was executing.
    SessionDisconnected,
    /// File transfer failure (path denied, read/write failed, too large).
    TransferError,
}

impl ErrorKind {
    /// The `snake_case` wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "config_error",
            Self::InvalidRequest => "invalid_request",
            Self::AuthFailed => "auth_failed",
            Self::NetworkUnreachable => "network_unreachable",
            Self::HostKeyMismatch => "host_key_mismatch",
            Self::ConnectTimeout => "connect_timeout",
            Self::NotFound => "not_found",
            Self::MaxSessionsReached => "max_sessions_reached",
            Self::BusySession => "busy_session",
            Self::Denied => "denied",
            Self::PasswordRequired => "password_required",
            Self::SessionBroken => "session_broken",
            Self::SessionDisconnected => "session_disconnected",
            Self::TransferError => "transfer_error",
        }
    }
}

/// Process-level error type.
///
/// Startup and configuration failures live here; per-session failures are
/// classified by the session layer and surfaced through [`ErrorKind`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BosunError {
    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error in the config overlay file.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BosunError {
    /// Shorthand for a [`BosunError::ConfigInvalid`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }
}

/// Convenience result alias for process-level operations.
pub type Result<T> = std::result::Result<T, BosunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MaxSessionsReached).unwrap();
        assert_eq!(json, "\"max_sessions_reached\"");
        assert_eq!(
            ErrorKind::MaxSessionsReached.as_str(),
            "max_sessions_reached"
        );
    }

    #[test]
    fn error_kind_roundtrip() {
        for kind in [
            ErrorKind::ConfigError,
            ErrorKind::AuthFailed,
            ErrorKind::HostKeyMismatch,
            ErrorKind::Denied,
            ErrorKind::PasswordRequired,
            ErrorKind::TransferError,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: ErrorKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
