//! File transfer path validation.
//!
//! Transfers are admitted only for absolute remote paths under one of the
//! configured allow-prefixes. The check applies to the literal request
//! path; symlink traversal inside the remote filesystem is the remote's
//! concern, not the broker's.

use std::path::{Component, Path, PathBuf};

use crate::error::{SessionError, TransferErrorKind};

/// Validate a remote path against the transfer allow-prefixes.
pub fn check_path(path: &str, allowed: &[PathBuf]) -> Result<(), SessionError> {
    let p = Path::new(path);
    if !p.is_absolute() {
        return Err(SessionError::transfer(
            TransferErrorKind::PathDenied,
            format!("path must be absolute: {path}"),
        ));
    }
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(SessionError::transfer(
            TransferErrorKind::PathDenied,
            format!("path may not contain '..': {path}"),
        ));
    }
    if allowed
        .iter()
        .filter(|prefix| !prefix.as_os_str().is_empty())
        .any(|prefix| p.starts_with(prefix))
    {
        Ok(())
    } else {
        Err(SessionError::transfer(
            TransferErrorKind::PathDenied,
            format!("path is outside the transfer allow-list: {path}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> Vec<PathBuf> {
        vec![
            PathBuf::from("/tmp"),
            PathBuf::from("/var/log"),
            PathBuf::from("/opt"),
        ]
    }

    #[test]
    fn paths_under_a_prefix_pass() {
        assert!(check_path("/tmp/upload.bin", &prefixes()).is_ok());
        assert!(check_path("/var/log/syslog", &prefixes()).is_ok());
    }

    #[test]
    fn relative_paths_are_denied() {
        let err = check_path("tmp/upload.bin", &prefixes()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transfer {
                kind: TransferErrorKind::PathDenied,
                ..
            }
        ));
    }

    #[test]
    fn parent_traversal_is_denied() {
        assert!(check_path("/tmp/../etc/shadow", &prefixes()).is_err());
    }

    #[test]
    fn prefix_match_is_component_wise() {
        // /tmpfoo must not satisfy the /tmp prefix.
        assert!(check_path("/tmpfoo/x", &prefixes()).is_err());
    }

    #[test]
    fn outside_paths_are_denied() {
        assert!(check_path("/etc/passwd", &prefixes()).is_err());
    }
}
