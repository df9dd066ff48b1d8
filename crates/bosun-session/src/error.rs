//! Session-layer error classification.
//!
//! The session layer classifies and annotates failures; the dispatcher
//! serialises them into the `{success: false, error, details}` envelope
//! via [`SessionError::kind`].

use std::time::Duration;

use thiserror::Error;

use bosun_types::ErrorKind;

/// What went wrong during a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferErrorKind {
    /// The path is outside every configured allow-prefix.
    PathDenied,
    /// The remote file could not be opened or read.
    ReadFailed,
    /// The remote file could not be created or written.
    WriteFailed,
    /// The payload exceeds the transfer size cap.
    TooLarge,
}

impl TransferErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PathDenied => "path_denied",
            Self::ReadFailed => "read_failed",
            Self::WriteFailed => "write_failed",
            Self::TooLarge => "too_large",
        }
    }
}

/// Errors produced by the session runtime and the registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// Every authentication method was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The transport could not be established.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The remote presented a key that differs from the recorded one.
    #[error("host key mismatch: {0}")]
    HostKeyMismatch(String),

    /// The transport did not come up within the connect timeout.
    #[error("connect timed out after {}ms", .0.as_millis())]
    ConnectTimeout(Duration),

    /// A command is already executing on this session.
    #[error("a command is already running on this session")]
    Busy,

    /// Terminal channel or transport failure; reconnect to recover.
    #[error("session channel is broken")]
    Broken,

    /// The session was disconnected while a command was executing.
    #[error("session disconnected")]
    Disconnected,

    /// A prompt surfaced and was not resolved within the window.
    #[error("password required: {0}")]
    PasswordRequired(String),

    /// The registry is at its concurrent session cap.
    #[error("session limit reached ({0} live sessions)")]
    MaxSessions(usize),

    /// A caller-supplied session id collides with a live session.
    #[error("session id already in use: {0}")]
    DuplicateId(String),

    /// File transfer failure.
    #[error("transfer failed ({}): {message}", kind.as_str())]
    Transfer {
        kind: TransferErrorKind,
        message: String,
    },

    /// SSH protocol failure outside the categories above.
    #[error("ssh protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// Shorthand for a transfer error.
    pub fn transfer(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self::Transfer {
            kind,
            message: message.into(),
        }
    }

    /// The wire-visible error kind for the response envelope.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailed(_) => ErrorKind::AuthFailed,
            Self::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            Self::HostKeyMismatch(_) => ErrorKind::HostKeyMismatch,
            Self::ConnectTimeout(_) => ErrorKind::ConnectTimeout,
            Self::Busy => ErrorKind::BusySession,
            Self::Broken => ErrorKind::SessionBroken,
            Self::Disconnected => ErrorKind::SessionDisconnected,
            Self::PasswordRequired(_) => ErrorKind::PasswordRequired,
            Self::MaxSessions(_) => ErrorKind::MaxSessionsReached,
            Self::DuplicateId(_) => ErrorKind::InvalidRequest,
            Self::Transfer { .. } => ErrorKind::TransferError,
            Self::Protocol(_) => ErrorKind::SessionBroken,
        }
    }
}

impl From<russh::Error> for SessionError {
    fn from(e: russh::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_wire_names() {
        assert_eq!(SessionError::Busy.kind(), ErrorKind::BusySession);
        assert_eq!(
            SessionError::transfer(TransferErrorKind::PathDenied, "nope").kind(),
            ErrorKind::TransferError
        );
        assert_eq!(
            SessionError::ConnectTimeout(Duration::from_secs(30)).kind(),
            ErrorKind::ConnectTimeout
        );
    }

    #[test]
    fn transfer_error_message_carries_the_subkind() {
        let e = SessionError::transfer(TransferErrorKind::TooLarge, "9 MiB payload");
        assert_eq!(e.to_string(), "transfer failed (too_large): 9 MiB payload");
    }
}
