//! In-band authentication prompt matcher.
//!
//! [`PromptInterposer`] watches the interactive channel's output through a
//! rolling tail window and recognises password prompts as they appear.
//! It never consumes bytes from the capture's view; when a prompt is acted
//! on, the window is advanced so the same prompt cannot fire twice.
//!
//! Password-style prompts sit at the end of the stream with no trailing
//! newline, so they are matched against the window's final partial line.
//! The `sudo: a terminal is required` failure and the host-authenticity
//! question span completed lines and are matched against the whole window.

use std::sync::LazyLock;

use regex::Regex;

use bosun_types::PromptKind;

static SUDO_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[sudo\] password for [^:]+:\s*$").expect("sudo prompt"));
static SSH_PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[^@\s]+@[^:]+'s password:\s*$").expect("ssh prompt"));
static BARE_PASSWORD_PROMPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^password\s*(for [^:]+)?:\s*$").expect("password prompt"));
static HOST_AUTHENTICITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)the authenticity of host .*are you sure[^\n]*\??\s*$")
        .expect("authenticity prompt")
});
static TERMINAL_REQUIRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^sudo: a terminal is required").expect("terminal-required line")
});

/// How a recognised prompt wants to be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// A password is awaited on the channel's input side.
    Password,
    /// `Are you sure you want to continue connecting` -- answered `yes`
    /// only under an explicit config flag, surfaced otherwise.
    HostAuthenticity,
    /// `sudo: a terminal is required` -- a failure notice, never injected.
    TerminalRequired,
}

/// One recognised prompt.
#[derive(Debug, Clone)]
pub struct PromptSighting {
    pub kind: PromptKind,
    pub style: PromptStyle,
    /// The prompt text as seen on the channel, for surfacing.
    pub text: String,
}

/// Stateful matcher over the rolling output window of one command.
pub struct PromptInterposer {
    window: String,
    window_cap: usize,
    /// Whether the active command begins with `sudo`, which disambiguates
    /// a bare `Password:`.
    sudo_context: bool,
    injected_sudo: bool,
    injected_ssh: bool,
}

impl PromptInterposer {
    /// Create the interposer for one command.
    pub fn new(window_cap: usize, command: &str) -> Self {
        Self {
            window: String::new(),
            window_cap,
            sudo_context: command.trim_start().starts_with("sudo"),
            injected_sudo: false,
            injected_ssh: false,
        }
    }

    /// Whether the active command begins with `sudo`.
    pub fn sudo_context(&self) -> bool {
        self.sudo_context
    }

    /// Record a sudo injection; returns `false` when one already happened.
    /// Proactive and reactive injections share the once-per-command budget.
    pub fn mark_sudo_injected(&mut self) -> bool {
        !std::mem::replace(&mut self.injected_sudo, true)
    }

    /// Record an ssh password injection; returns `false` on the second try.
    pub fn mark_ssh_injected(&mut self) -> bool {
        !std::mem::replace(&mut self.injected_ssh, true)
    }

    /// Advance the window past a prompt that has been acted on.
    pub fn advance(&mut self) {
        self.window.clear();
    }

    /// Append a chunk and scan for a prompt.
    pub fn feed(&mut self, chunk: &str) -> Option<PromptSighting> {
        self.window.push_str(chunk);
        if self.window.len() > self.window_cap {
            let excess = self.window.len() - self.window_cap;
            let cut = self
                .window
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= excess)
                .unwrap_or(0);
            self.window.drain(..cut);
        }
        self.scan()
    }

    fn scan(&self) -> Option<PromptSighting> {
        if let Some(m) = TERMINAL_REQUIRED.find(&self.window) {
            return Some(PromptSighting {
                kind: PromptKind::Sudo,
                style: PromptStyle::TerminalRequired,
                text: m.as_str().to_string(),
            });
        }
        if let Some(m) = HOST_AUTHENTICITY.find(&self.window) {
            return Some(PromptSighting {
                kind: PromptKind::Ssh,
                style: PromptStyle::HostAuthenticity,
                text: m.as_str().to_string(),
            });
        }

        // Password prompts wait without a newline: look at the tail line.
        let tail = self
            .window
            .rsplit('\n')
            .next()
            .unwrap_or(&self.window)
            .trim_end_matches('\r');
        if tail.is_empty() {
            return None;
        }

        if SUDO_PROMPT.is_match(tail) {
            return Some(PromptSighting {
                kind: PromptKind::Sudo,
                style: PromptStyle::Password,
                text: tail.to_string(),
            });
        }
        if SSH_PASSWORD_PROMPT.is_match(tail) {
            return Some(PromptSighting {
                kind: PromptKind::Ssh,
                style: PromptStyle::Password,
                text: tail.to_string(),
            });
        }
        if BARE_PASSWORD_PROMPT.is_match(tail) {
            let kind = if self.sudo_context {
                PromptKind::Sudo
            } else {
                PromptKind::Generic
            };
            return Some(PromptSighting {
                kind,
                style: PromptStyle::Password,
                text: tail.to_string(),
            });
        }
        None
    }
}
