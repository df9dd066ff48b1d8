//! # bosun-policy
//!
//! Three-tier command permissibility engine.
//!
//! Every command submitted through `ssh_run` passes through
//! [`PolicyEngine::validate`] before any channel I/O. Classification is a
//! pure function of the command string and the engine's immutable tables:
//! nested per-tier allowlists keyed on the head token's basename, an
//! always-denied name set, and two pattern layers (always-forbidden, and
//! tier-specific chaining/redirection/injection guards).
//!
//! Matching the head token alone is bypassable with absolute paths, so the
//! head is stripped back to its basename before the allowlist lookup and
//! the pattern layer scans the full command string.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use bosun_types::config::PolicyConfig;
use bosun_types::{BosunError, PermissibilityLevel};

pub mod tables;

// ── Validation result ────────────────────────────────────────────────────

/// Which rule decided the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchedRule {
    /// The head token is not in the active tier's allowed set.
    NameNotAllowed,
    /// A tier-specific forbidden pattern matched.
    PatternForbidden,
    /// The name or pattern is denied at every tier.
    AlwaysDenied,
    /// The command passed every check.
    Ok,
}

/// The outcome of classifying one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the command may be sent to the channel.
    pub allowed: bool,
    /// Human-readable explanation, safe to surface to the agent.
    pub reason: String,
    /// Which rule produced the decision.
    pub matched_rule: MatchedRule,
}

impl ValidationResult {
    fn deny(rule: MatchedRule, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            matched_rule: rule,
        }
    }

    fn allow() -> Self {
        Self {
            allowed: true,
            reason: "ok".to_string(),
            matched_rule: MatchedRule::Ok,
        }
    }
}

/// Summary counters backing `ssh_get_permissibility_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyInfo {
    /// Active tier name.
    pub level: PermissibilityLevel,
    /// Size of the active tier's allowed set.
    pub allowed_count: usize,
    /// Size of the always-denied set.
    pub always_denied_count: usize,
    /// Number of compiled patterns consulted for this tier.
    pub patterns_active: usize,
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Immutable command classifier for one permissibility tier.
///
/// Built once at startup; a malformed operator-supplied pattern is a fatal
/// configuration error, never a runtime deny.
pub struct PolicyEngine {
    level: PermissibilityLevel,
    allowed: HashSet<String>,
    always_denied: HashSet<String>,
    always_forbidden: Vec<Regex>,
    tier_forbidden: Vec<Regex>,
}

impl PolicyEngine {
    /// Build the engine for `level`, merging operator extensions from
    /// `policy`.
    ///
    /// Operator-added allowed names are admitted at every tier; added
    /// denied names extend the always-denied set. A name appearing in both
    /// is rejected here rather than silently shadowed.
    pub fn new(level: PermissibilityLevel, policy: &PolicyConfig) -> Result<Self, BosunError> {
        let mut always_denied: HashSet<String> =
            tables::ALWAYS_DENIED.iter().map(|s| s.to_string()).collect();
        for name in &policy.extra_denied {
            always_denied.insert(name.clone());
        }

        let mut allowed: HashSet<String> =
            tables::LOW_COMMANDS.iter().map(|s| s.to_string()).collect();
        for name in &policy.extra_allowed {
            allowed.insert(name.clone());
        }
        if level != PermissibilityLevel::Low {
            allowed.extend(tables::MEDIUM_EXTRA.iter().map(|s| s.to_string()));
        }
        if level == PermissibilityLevel::High {
            allowed.extend(tables::HIGH_EXTRA.iter().map(|s| s.to_string()));
        }

        if let Some(clash) = allowed.iter().find(|name| always_denied.contains(*name)) {
            return Err(BosunError::config(format!(
                "policy extension lists '{clash}' as both allowed and denied"
            )));
        }

        let mut always_forbidden = compile_patterns(tables::ALWAYS_FORBIDDEN_PATTERNS)?;
        always_forbidden.extend(compile_owned_patterns(&policy.extra_forbidden_patterns)?);

        let tier_forbidden = match level {
            PermissibilityLevel::Low => compile_patterns(tables::LOW_FORBIDDEN_PATTERNS)?,
            PermissibilityLevel::Medium => compile_patterns(tables::MEDIUM_FORBIDDEN_PATTERNS)?,
            PermissibilityLevel::High => Vec::new(),
        };

        Ok(Self {
            level,
            allowed,
            always_denied,
            always_forbidden,
            tier_forbidden,
        })
    }

    /// The active permissibility tier.
    pub fn level(&self) -> PermissibilityLevel {
        self.level
    }

    /// Summary counters for `ssh_get_permissibility_info`.
    pub fn info(&self) -> PolicyInfo {
        PolicyInfo {
            level: self.level,
            allowed_count: self.allowed.len(),
            always_denied_count: self.always_denied.len(),
            patterns_active: self.always_forbidden.len() + self.tier_forbidden.len(),
        }
    }

    /// Classify one command. First matching rule wins.
    pub fn validate(&self, command: &str) -> ValidationResult {
        let trimmed = command.trim_start();
        if trimmed.is_empty() {
            return ValidationResult::deny(MatchedRule::NameNotAllowed, "empty command");
        }

        let mut tokens = trimmed.split_whitespace();
        let first = basename(tokens.next().unwrap_or_default());

        let (effective_head, uses_sudo) = if first == "sudo" {
            (tokens.find(|t| !t.starts_with('-')).map(basename), true)
        } else {
            (Some(first), false)
        };

        let Some(head) = effective_head else {
            return ValidationResult::deny(MatchedRule::NameNotAllowed, "sudo with no command");
        };

        if self.always_denied.contains(head) {
            return ValidationResult::deny(
                MatchedRule::AlwaysDenied,
                format!("command is always denied: {head}"),
            );
        }

        if !self.allowed.contains(head) {
            return ValidationResult::deny(
                MatchedRule::NameNotAllowed,
                format!(
                    "command not allowed at {} permissibility: {head}",
                    self.level.as_str()
                ),
            );
        }

        if uses_sudo && self.level != PermissibilityLevel::High {
            return ValidationResult::deny(
                MatchedRule::NameNotAllowed,
                "sudo not permitted at this tier",
            );
        }

        for pattern in &self.always_forbidden {
            if pattern.is_match(trimmed) {
                return ValidationResult::deny(
                    MatchedRule::AlwaysDenied,
                    format!("forbidden pattern: {}", pattern.as_str()),
                );
            }
        }

        for pattern in &self.tier_forbidden {
            if pattern.is_match(trimmed) {
                return ValidationResult::deny(
                    MatchedRule::PatternForbidden,
                    format!("forbidden pattern: {}", pattern.as_str()),
                );
            }
        }

        // At medium, a single pipe passed the pattern layer; every segment
        // downstream of a pipe must itself start with an allowed command.
        if self.level == PermissibilityLevel::Medium && trimmed.contains('|') {
            if let Some(result) = self.check_pipe_segments(trimmed) {
                return result;
            }
        }

        debug!(head, uses_sudo, "command admitted");
        ValidationResult::allow()
    }

    fn check_pipe_segments(&self, command: &str) -> Option<ValidationResult> {
        for segment in command.split('|') {
            let Some(head) = segment.split_whitespace().next().map(basename) else {
                return Some(ValidationResult::deny(
                    MatchedRule::PatternForbidden,
                    "empty pipe segment",
                ));
            };
            if !self.allowed.contains(head) || self.always_denied.contains(head) {
                return Some(ValidationResult::deny(
                    MatchedRule::PatternForbidden,
                    format!("pipe to command not allowed: {head}"),
                ));
            }
        }
        None
    }
}

/// Strip any path prefix so `/usr/bin/ls` compares as `ls`.
fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

fn compile_patterns(patterns: &[&str]) -> Result<Vec<Regex>, BosunError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| BosunError::config(format!("invalid policy pattern '{p}': {e}")))
        })
        .collect()
}

fn compile_owned_patterns(patterns: &[String]) -> Result<Vec<Regex>, BosunError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| BosunError::config(format!("invalid policy pattern '{p}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(level: PermissibilityLevel) -> PolicyEngine {
        PolicyEngine::new(level, &PolicyConfig::default()).unwrap()
    }

    #[test]
    fn empty_command_is_denied() {
        let result = engine(PermissibilityLevel::High).validate("   ");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::NameNotAllowed);
    }

    #[test]
    fn absolute_path_head_is_stripped_to_basename() {
        let result = engine(PermissibilityLevel::Low).validate("/usr/bin/ls -la");
        assert!(result.allowed, "{}", result.reason);
    }

    #[test]
    fn sudo_alone_is_denied() {
        let result = engine(PermissibilityLevel::High).validate("sudo");
        assert!(!result.allowed);
    }

    #[test]
    fn sudo_flag_tokens_are_skipped_for_the_effective_head() {
        let result = engine(PermissibilityLevel::High).validate("sudo -n systemctl status ssh");
        assert!(result.allowed, "{}", result.reason);
    }

    #[test]
    fn sudo_denied_below_high() {
        let medium = engine(PermissibilityLevel::Medium);
        let result = medium.validate("sudo systemctl status ssh");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::NameNotAllowed);

        let high = engine(PermissibilityLevel::High);
        assert!(high.validate("sudo systemctl status ssh").allowed);
    }

    #[test]
    fn always_denied_wins_even_under_sudo_at_high() {
        let result = engine(PermissibilityLevel::High).validate("sudo dd if=/dev/zero of=x");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::AlwaysDenied);
    }

    #[test]
    fn rm_rf_root_is_always_denied_at_high() {
        let result = engine(PermissibilityLevel::High).validate("rm -rf /");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::AlwaysDenied);
    }

    #[test]
    fn chaining_is_pattern_forbidden_at_medium() {
        let result = engine(PermissibilityLevel::Medium).validate("ls && rm -rf /tmp/x");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::PatternForbidden);
    }

    #[test]
    fn single_pipe_between_allowed_heads_passes_at_medium() {
        let engine = engine(PermissibilityLevel::Medium);
        assert!(engine.validate("yes hello | head -c 200000").allowed);
        assert!(engine.validate("ps aux | grep sshd | wc -l").allowed);
    }

    #[test]
    fn pipe_to_disallowed_head_is_denied_at_medium() {
        let result = engine(PermissibilityLevel::Medium).validate("cat /etc/passwd | mount");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::PatternForbidden);
    }

    #[test]
    fn pipe_is_forbidden_at_low() {
        let result = engine(PermissibilityLevel::Low).validate("ps aux | grep sshd");
        assert!(!result.allowed);
        assert_eq!(result.matched_rule, MatchedRule::PatternForbidden);
    }

    #[test]
    fn or_chaining_is_denied_at_medium_despite_pipe_allowance() {
        let result = engine(PermissibilityLevel::Medium).validate("true || rm -r /tmp/x");
        assert!(!result.allowed);
    }

    #[test]
    fn command_substitution_is_denied_below_high() {
        assert!(!engine(PermissibilityLevel::Low).validate("echo $(whoami)").allowed);
        assert!(!engine(PermissibilityLevel::Medium).validate("echo `whoami`").allowed);
        assert!(engine(PermissibilityLevel::High).validate("echo $(whoami)").allowed);
    }

    #[test]
    fn redirection_is_denied_below_high() {
        assert!(!engine(PermissibilityLevel::Low).validate("ls > /tmp/out").allowed);
        assert!(!engine(PermissibilityLevel::Medium).validate("cat < /etc/hosts").allowed);
    }

    #[test]
    fn operator_extensions_are_admitted_at_every_tier() {
        let policy = PolicyConfig {
            extra_allowed: vec!["mytool".to_string()],
            ..Default::default()
        };
        let engine = PolicyEngine::new(PermissibilityLevel::Low, &policy).unwrap();
        assert!(engine.validate("mytool --status").allowed);
    }

    #[test]
    fn conflicting_extension_is_a_config_error() {
        let policy = PolicyConfig {
            extra_allowed: vec!["dd".to_string()],
            ..Default::default()
        };
        assert!(PolicyEngine::new(PermissibilityLevel::Low, &policy).is_err());
    }

    #[test]
    fn malformed_operator_pattern_is_a_config_error() {
        let policy = PolicyConfig {
            extra_forbidden_patterns: vec!["[unclosed".to_string()],
            ..Default::default()
        };
        assert!(PolicyEngine::new(PermissibilityLevel::Medium, &policy).is_err());
    }

    #[test]
    fn info_counts_reflect_the_active_tier() {
        let low = engine(PermissibilityLevel::Low).info();
        let high = engine(PermissibilityLevel::High).info();
        assert!(low.allowed_count < high.allowed_count);
        assert_eq!(low.always_denied_count, tables::ALWAYS_DENIED.len());
        // High consults only the always-forbidden layer.
        assert!(high.patterns_active < low.patterns_active);
    }

    #[test]
    fn matched_rule_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&MatchedRule::NameNotAllowed).unwrap(),
            "\"name-not-allowed\""
        );
        assert_eq!(
            serde_json::to_string(&MatchedRule::PatternForbidden).unwrap(),
            "\"pattern-forbidden\""
        );
    }
}
