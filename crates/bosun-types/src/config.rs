//! Configuration schema and layered loading.
//!
//! Sources, lowest to highest precedence: built-in defaults, environment
//! variables with fixed `BOSUN_*` names, then an optional YAML file whose
//! keys mirror the schema. Per-call tool parameters override all three but
//! are applied in the handlers, not here.
//!
//! The loaded [`Config`] is an immutable snapshot: it is built once at
//! startup and shared behind an `Arc` for the lifetime of the process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BosunError, Result};
use crate::secret::SecretString;

// ── Environment variable names ──────────────────────────────────────────

/// Fixed environment variable names read by [`Config::load`].
pub mod env_keys {
    pub const PERMISSIBILITY: &str = "BOSUN_PERMISSIBILITY";
    pub const HOST: &str = "BOSUN_HOST";
    pub const PORT: &str = "BOSUN_PORT";
    pub const USER: &str = "BOSUN_USER";
    pub const KEY_PATH: &str = "BOSUN_KEY_PATH";
    pub const SSH_PASSWORD: &str = "BOSUN_SSH_PASSWORD";
    pub const SUDO_PASSWORD: &str = "BOSUN_SUDO_PASSWORD";
    pub const FALLBACK_PASSWORD: &str = "BOSUN_FALLBACK_PASSWORD";
    pub const INTERACTIVE: &str = "BOSUN_INTERACTIVE";
    pub const DEBUG: &str = "BOSUN_DEBUG";
    pub const LOG_LEVEL: &str = "BOSUN_LOG_LEVEL";
    /// Path to the optional YAML overlay file.
    pub const CONFIG_FILE: &str = "BOSUN_CONFIG";
}

// ── Permissibility ───────────────────────────────────────────────────────

/// Process-global security tier controlling which commands are admitted.
///
/// Immutable for the lifetime of the process. Unknown string values
/// default to [`PermissibilityLevel::Medium`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissibilityLevel {
    /// Read-only informational commands, no chaining or redirection.
    Low,
    /// File manipulation and development tools; single pipes between
    /// allowed commands are permitted.
    #[default]
    Medium,
    /// Administrative commands including `sudo`; only the always-forbidden
    /// patterns apply.
    High,
}

impl PermissibilityLevel {
    /// Parse a tier name, case-insensitively. Unknown values are `Medium`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// The lowercase wire name of this tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

// ── Limits ───────────────────────────────────────────────────────────────

/// Resource caps for command execution and session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    /// Combined stdout + stderr byte cap per command.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Output line cap per command.
    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,

    /// Default command wall-clock timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Transport connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// SSH keepalive interval in seconds.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Maximum concurrent live sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle TTL in seconds before a session is evicted. The long default
    /// (8 hours) suits long-lived agent conversations; deployments that
    /// prefer aggressive reclamation set this down to tens of seconds.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Eviction sweep interval in seconds.
    #[serde(default = "default_eviction_tick_secs")]
    pub eviction_tick_secs: u64,

    /// Tail-window size for the prompt interposer, in bytes.
    #[serde(default = "default_prompt_window_bytes")]
    pub prompt_window_bytes: usize,

    /// How long an unanswered password prompt stays pending, in seconds.
    #[serde(default = "default_pending_prompt_ttl_secs")]
    pub pending_prompt_ttl_secs: u64,
}

fn default_max_output_bytes() -> usize {
    131_072
}
fn default_max_output_lines() -> usize {
    1_000
}
fn default_command_timeout_ms() -> u64 {
    30_000
}
fn default_connect_timeout_ms() -> u64 {
    30_000
}
fn default_keepalive_secs() -> u64 {
    30
}
fn default_max_sessions() -> usize {
    5
}
fn default_idle_ttl_secs() -> u64 {
    8 * 60 * 60
}
fn default_eviction_tick_secs() -> u64 {
    30
}
fn default_prompt_window_bytes() -> usize {
    4_096
}
fn default_pending_prompt_ttl_secs() -> u64 {
    60
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_output_bytes: default_max_output_bytes(),
            max_output_lines: default_max_output_lines(),
            command_timeout_ms: default_command_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            keepalive_secs: default_keepalive_secs(),
            max_sessions: default_max_sessions(),
            idle_ttl_secs: default_idle_ttl_secs(),
            eviction_tick_secs: default_eviction_tick_secs(),
            prompt_window_bytes: default_prompt_window_bytes(),
            pending_prompt_ttl_secs: default_pending_prompt_ttl_secs(),
        }
    }
}

impl Limits {
    /// Command timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Idle TTL as a [`Duration`].
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

// ── File transfer ────────────────────────────────────────────────────────

/// File transfer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Remote path prefixes under which uploads and downloads are allowed.
    /// Empty entries are ignored.
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_prefixes: Vec<PathBuf>,

    /// Default download byte cap when the call does not specify one.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: usize,

    /// Hard cap on upload payload size.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_allowed_prefixes() -> Vec<PathBuf> {
    let mut prefixes = Vec::new();
    if let Some(home) = dirs::home_dir() {
        prefixes.push(home);
    }
    prefixes.push(PathBuf::from("/var/log"));
    prefixes.push(PathBuf::from("/tmp"));
    prefixes.push(PathBuf::from("/opt"));
    prefixes
}

fn default_max_download_bytes() -> usize {
    65_536
}

fn default_max_upload_bytes() -> usize {
    1_048_576
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            allowed_prefixes: default_allowed_prefixes(),
            max_download_bytes: default_max_download_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

// ── Authentication ───────────────────────────────────────────────────────

/// Connection defaults and credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default host for `ssh_connect` calls that omit one. Optional; the
    /// tool call's `host` parameter is normally authoritative.
    #[serde(default)]
    pub host: Option<String>,

    /// Default port.
    #[serde(default)]
    pub port: Option<u16>,

    /// Default login user.
    #[serde(default)]
    pub username: Option<String>,

    /// Path to a private key file.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    /// SSH login password.
    #[serde(default)]
    pub ssh_password: Option<SecretString>,

    /// Password injected for sudo prompts.
    #[serde(default)]
    pub sudo_password: Option<SecretString>,

    /// Generic fallback secret tried when no sudo password is known.
    #[serde(default)]
    pub fallback_password: Option<SecretString>,

    /// Whether unanswerable prompts become pending password requests
    /// instead of failing the command.
    #[serde(default)]
    pub interactive: bool,

    /// Accept host keys never seen before. Changed keys always fail.
    #[serde(default = "crate::config::default_true")]
    pub accept_unknown_host_keys: bool,

    /// Answer in-stream `Are you sure you want to continue connecting`
    /// prompts (from nested ssh invocations) with `yes`.
    #[serde(default)]
    pub answer_host_key_prompts: bool,
}

pub(crate) fn default_true() -> bool {
    true
}

/// Resolved authentication material for one session.
///
/// Built from [`AuthConfig`] merged with `ssh_connect` parameters.
/// Secrets are memory-resident and never serialised.
#[derive(Debug, Clone, Default)]
pub struct AuthMaterial {
    pub ssh_password: Option<SecretString>,
    pub sudo_password: Option<SecretString>,
    pub fallback_password: Option<SecretString>,
    pub key_path: Option<PathBuf>,
    pub interactive_enabled: bool,
    pub accept_unknown_host_keys: bool,
    pub answer_host_key_prompts: bool,
}

/// The outcome of resolving a sudo secret for one command.
#[derive(Debug, Clone, PartialEq)]
pub enum SudoSecret {
    /// A secret is known and may be injected.
    Known(SecretString),
    /// No secret is known but interactive mode may ask the operator.
    Interactive,
    /// No secret and no interactive mode: injection is impossible.
    Unavailable,
}

impl AuthMaterial {
    /// Build session auth material from config-level defaults.
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            ssh_password: auth.ssh_password.clone(),
            sudo_password: auth.sudo_password.clone(),
            fallback_password: auth.fallback_password.clone(),
            key_path: auth.key_path.clone(),
            interactive_enabled: auth.interactive,
            accept_unknown_host_keys: auth.accept_unknown_host_keys,
            answer_host_key_prompts: auth.answer_host_key_prompts,
        }
    }

    /// Resolve the sudo secret for one command.
    ///
    /// Fallback chain: explicit per-call parameter, configured sudo
    /// password, generic fallback secret, interactive prompt (if enabled),
    /// then unavailable.
    pub fn resolve_sudo(&self, per_call: Option<&SecretString>) -> SudoSecret {
        for candidate in [
            per_call,
            self.sudo_password.as_ref(),
            self.fallback_password.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            if !candidate.is_empty() {
                return SudoSecret::Known(candidate.clone());
            }
        }
        if self.interactive_enabled {
            SudoSecret::Interactive
        } else {
            SudoSecret::Unavailable
        }
    }
}

// ── Policy extensions ────────────────────────────────────────────────────

/// Operator extensions to the built-in policy tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Extra command names admitted at every tier.
    #[serde(default)]
    pub extra_allowed: Vec<String>,

    /// Extra command names denied at every tier.
    #[serde(default)]
    pub extra_denied: Vec<String>,

    /// Extra always-forbidden regular expressions. A malformed pattern is
    /// a startup-time fatal error, never a runtime deny.
    #[serde(default)]
    pub extra_forbidden_patterns: Vec<String>,
}

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active permissibility tier.
    #[serde(default)]
    pub permissibility: PermissibilityLevel,

    /// Resource caps.
    #[serde(default)]
    pub limits: Limits,

    /// File transfer settings.
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Connection defaults and credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Policy table extensions.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Verbose diagnostics.
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Load the configuration snapshot.
    ///
    /// Starts from defaults, applies `BOSUN_*` environment variables, then
    /// overlays the YAML file named by `path_override` or `BOSUN_CONFIG`
    /// when present. YAML keys win over environment values.
    pub fn load(path_override: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;

        let yaml_path = path_override
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(env_keys::CONFIG_FILE).ok().map(PathBuf::from));

        if let Some(path) = yaml_path {
            if !path.exists() {
                return Err(BosunError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            let contents = std::fs::read_to_string(&path)?;
            config.apply_yaml(&contents)?;
        }

        Ok(config)
    }

    /// Apply `BOSUN_*` environment variables.
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var(env_keys::PERMISSIBILITY) {
            self.permissibility = PermissibilityLevel::parse(&v);
        }
        if let Ok(v) = std::env::var(env_keys::HOST) {
            self.auth.host = Some(v);
        }
        if let Ok(v) = std::env::var(env_keys::PORT) {
            let port = v.parse::<u16>().map_err(|_| {
                BosunError::config(format!("{} is not a valid port: {v}", env_keys::PORT))
            })?;
            self.auth.port = Some(port);
        }
        if let Ok(v) = std::env::var(env_keys::USER) {
            self.auth.username = Some(v);
        }
        if let Ok(v) = std::env::var(env_keys::KEY_PATH) {
            self.auth.key_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var(env_keys::SSH_PASSWORD) {
            self.auth.ssh_password = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(env_keys::SUDO_PASSWORD) {
            self.auth.sudo_password = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(env_keys::FALLBACK_PASSWORD) {
            self.auth.fallback_password = Some(SecretString::new(v));
        }
        if let Ok(v) = std::env::var(env_keys::INTERACTIVE) {
            self.auth.interactive = parse_bool(&v);
        }
        if let Ok(v) = std::env::var(env_keys::DEBUG) {
            self.debug = parse_bool(&v);
        }
        if let Ok(v) = std::env::var(env_keys::LOG_LEVEL) {
            self.log_level = Some(v);
        }
        Ok(())
    }

    /// Overlay YAML document keys onto this config.
    ///
    /// Only keys present in the document are touched, so YAML wins over
    /// environment values without erasing fields it does not name. The
    /// `auth` section is merged per field because its keys are also
    /// env-settable; the other sections have no environment source and
    /// are taken wholesale.
    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        use serde_yaml::Value;

        let doc: Value = serde_yaml::from_str(contents)?;
        let Value::Mapping(map) = doc else {
            // An empty or scalar document changes nothing.
            return Ok(());
        };

        for (key, value) in &map {
            let Some(key) = key.as_str() else { continue };
            match key {
                "permissibility" => {
                    let s: String = from_yaml(value)?;
                    self.permissibility = PermissibilityLevel::parse(&s);
                }
                "limits" => self.limits = from_yaml(value)?,
                "transfer" => self.transfer = from_yaml(value)?,
                "auth" => self.merge_auth(value)?,
                "policy" => self.policy = from_yaml(value)?,
                "log_level" => self.log_level = Some(from_yaml(value)?),
                "debug" => self.debug = from_yaml(value)?,
                // Unknown keys are ignored for forward compatibility.
                _ => {}
            }
        }
        Ok(())
    }

    fn merge_auth(&mut self, section: &serde_yaml::Value) -> Result<()> {
        let serde_yaml::Value::Mapping(map) = section else {
            return Ok(());
        };
        for (key, value) in map {
            let Some(key) = key.as_str() else { continue };
            match key {
                "host" => self.auth.host = Some(from_yaml(value)?),
                "port" => self.auth.port = Some(from_yaml(value)?),
                "username" => self.auth.username = Some(from_yaml(value)?),
                "key_path" => self.auth.key_path = Some(from_yaml(value)?),
                "ssh_password" => {
                    self.auth.ssh_password = Some(SecretString::new(from_yaml::<String>(value)?));
                }
                "sudo_password" => {
                    self.auth.sudo_password = Some(SecretString::new(from_yaml::<String>(value)?));
                }
                "fallback_password" => {
                    self.auth.fallback_password =
                        Some(SecretString::new(from_yaml::<String>(value)?));
                }
                "interactive" => self.auth.interactive = from_yaml(value)?,
                "accept_unknown_host_keys" => {
                    self.auth.accept_unknown_host_keys = from_yaml(value)?;
                }
                "answer_host_key_prompts" => {
                    self.auth.answer_host_key_prompts = from_yaml(value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// All configured secrets, for response redaction.
    pub fn secrets(&self) -> Vec<&SecretString> {
        [
            self.auth.ssh_password.as_ref(),
            self.auth.sudo_password.as_ref(),
            self.auth.fallback_password.as_ref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn from_yaml<T: serde::de::DeserializeOwned>(value: &serde_yaml::Value) -> Result<T> {
    Ok(serde_yaml::from_value(value.clone())?)
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tier_defaults_to_medium() {
        assert_eq!(
            PermissibilityLevel::parse("paranoid"),
            PermissibilityLevel::Medium
        );
        assert_eq!(PermissibilityLevel::parse("HIGH"), PermissibilityLevel::High);
        assert_eq!(PermissibilityLevel::parse(" low "), PermissibilityLevel::Low);
    }

    #[test]
    fn limits_defaults_match_documented_values() {
        let limits = Limits::default();
        assert_eq!(limits.max_output_bytes, 131_072);
        assert_eq!(limits.max_output_lines, 1_000);
        assert_eq!(limits.command_timeout_ms, 30_000);
        assert_eq!(limits.max_sessions, 5);
        assert_eq!(limits.prompt_window_bytes, 4_096);
        assert_eq!(limits.pending_prompt_ttl_secs, 60);
    }

    #[test]
    fn yaml_overlay_touches_only_present_keys() {
        let mut config = Config::default();
        config.auth.username = Some("enver".to_string());
        config
            .apply_yaml("permissibility: high\nlimits:\n  max_sessions: 9\n")
            .unwrap();

        assert_eq!(config.permissibility, PermissibilityLevel::High);
        assert_eq!(config.limits.max_sessions, 9);
        // Untouched by the overlay.
        assert_eq!(config.auth.username.as_deref(), Some("enver"));
        assert_eq!(config.limits.max_output_bytes, 131_072);
    }

    #[test]
    fn yaml_auth_overlay_carries_secrets() {
        let mut config = Config::default();
        config
            .apply_yaml("auth:\n  ssh_password: hunter2\n  interactive: true\n")
            .unwrap();
        assert_eq!(
            config.auth.ssh_password.as_ref().map(|s| s.expose()),
            Some("hunter2")
        );
        assert!(config.auth.interactive);
    }

    #[test]
    fn yaml_auth_merge_preserves_unnamed_fields() {
        let mut config = Config::default();
        config.auth.sudo_password = Some(SecretString::new("from-env"));
        config.apply_yaml("auth:\n  username: ops\n").unwrap();
        assert_eq!(config.auth.username.as_deref(), Some("ops"));
        assert_eq!(
            config.auth.sudo_password.as_ref().map(|s| s.expose()),
            Some("from-env")
        );
    }

    #[test]
    fn sudo_resolution_prefers_per_call() {
        let material = AuthMaterial {
            sudo_password: Some(SecretString::new("configured")),
            fallback_password: Some(SecretString::new("fallback")),
            ..Default::default()
        };
        let per_call = SecretString::new("explicit");
        match material.resolve_sudo(Some(&per_call)) {
            SudoSecret::Known(s) => assert_eq!(s.expose(), "explicit"),
            other => panic!("unexpected resolution: {other:?}"),
        }
    }

    #[test]
    fn sudo_resolution_falls_back_then_interactive() {
        let mut material = AuthMaterial {
            fallback_password: Some(SecretString::new("fallback")),
            ..Default::default()
        };
        match material.resolve_sudo(None) {
            SudoSecret::Known(s) => assert_eq!(s.expose(), "fallback"),
            other => panic!("unexpected resolution: {other:?}"),
        }

        material.fallback_password = None;
        assert_eq!(material.resolve_sudo(None), SudoSecret::Unavailable);

        material.interactive_enabled = true;
        assert_eq!(material.resolve_sudo(None), SudoSecret::Interactive);
    }

    #[test]
    fn load_reads_a_yaml_overlay_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bosun.yaml");
        std::fs::write(
            &path,
            "permissibility: low\nauth:\n  username: ops\nlimits:\n  idle_ttl_secs: 120\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.permissibility, PermissibilityLevel::Low);
        assert_eq!(config.auth.username.as_deref(), Some("ops"));
        assert_eq!(config.limits.idle_ttl_secs, 120);
    }

    #[test]
    fn load_with_missing_file_is_a_config_error() {
        let err = Config::load(Some(Path::new("/no/such/bosun.yaml"))).unwrap_err();
        assert!(matches!(err, BosunError::ConfigInvalid { .. }));
    }

    #[test]
    fn secrets_listing_skips_unset() {
        let mut config = Config::default();
        assert!(config.secrets().is_empty());
        config.auth.sudo_password = Some(SecretString::new("s"));
        assert_eq!(config.secrets().len(), 1);
    }
}
