//! One persistent SSH session: transport, interactive channel, and the
//! command execution loop.
//!
//! A session owns a single russh transport plus one interactive PTY
//! channel held open between commands, so `cd` and environment state
//! persist across `ssh_run` calls. Commands are bracketed with a fresh
//! random sentinel (see [`crate::capture`]); each output chunk flows
//! through the cap checker and the prompt interposer before the loop
//! decides whether to keep reading, inject a secret, or give up.
//!
//! The state machine:
//!
//! ```text
//! [new] --connect--> [idle] <--completion-- [busy]
//!                      |  \--run/upload/download--> [busy]
//!                      |                              |
//!                      | idle > TTL / disconnect      | fatal transport error
//!                      v                              v
//!                   [closed] <------disconnect---- [broken]
//! ```
//!
//! `broken` is terminal for the channel; every subsequent call fails and
//! reconnection is the agent's job via a fresh `ssh_connect`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bosun_policy::PolicyEngine;
use bosun_types::config::{Limits, TransferConfig};
use bosun_types::secret::SecretString;
use bosun_types::{AuthMaterial, ExecutionOutcome, PromptKind, SessionSummary, SudoSecret};

use crate::capture::OutputCapture;
use crate::error::{SessionError, TransferErrorKind};
use crate::interposer::{PromptInterposer, PromptSighting, PromptStyle};
use crate::prompts::PendingPrompts;
use crate::transfer::check_path;

/// How long the proactive sudo watchdog waits for first output.
const SUDO_WATCHDOG: Duration = Duration::from_secs(2);

/// Secondary timeout for draining to the sentinel after a cap fires.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

// ── Host key checking ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostKeyStatus {
    Unchecked,
    Trusted,
    Unknown,
    Mismatch,
}

struct ClientHandler {
    host: String,
    port: u16,
    accept_unknown: bool,
    status: Arc<Mutex<HostKeyStatus>>,
}

#[async_trait::async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => {
                *self.status.lock() = HostKeyStatus::Trusted;
                Ok(true)
            }
            Ok(false) => {
                *self.status.lock() = HostKeyStatus::Unknown;
                Ok(self.accept_unknown)
            }
            Err(russh_keys::Error::KeyChanged { .. }) => {
                warn!(host = %self.host, "host key changed, rejecting");
                *self.status.lock() = HostKeyStatus::Mismatch;
                Ok(false)
            }
            Err(e) => {
                // An unreadable known_hosts file is treated as first contact.
                debug!(host = %self.host, error = %e, "known_hosts unavailable");
                *self.status.lock() = HostKeyStatus::Unknown;
                Ok(self.accept_unknown)
            }
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────

struct Runtime {
    handle: client::Handle<ClientHandler>,
    shell: Option<Channel<Msg>>,
    cwd: Option<String>,
    broken: bool,
}

/// A live SSH transport plus a single interactive channel.
pub struct SshSession {
    id: String,
    host: String,
    port: u16,
    username: String,
    created_at: DateTime<Utc>,
    last_used: Mutex<(Instant, DateTime<Utc>)>,
    connected: AtomicBool,
    cancel: CancellationToken,
    limits: Limits,
    auth: AuthMaterial,
    runtime: tokio::sync::Mutex<Runtime>,
}

impl SshSession {
    /// Open the transport, authenticate, and leave one interactive
    /// channel idle.
    ///
    /// Authentication cascades key, password, then keyboard-interactive
    /// before declaring failure.
    pub async fn connect(
        id: String,
        host: String,
        port: u16,
        username: String,
        auth: AuthMaterial,
        limits: Limits,
    ) -> Result<Arc<Self>, SessionError> {
        let config = Arc::new(client::Config {
            keepalive_interval: Some(Duration::from_secs(limits.keepalive_secs)),
            ..Default::default()
        });
        let status = Arc::new(Mutex::new(HostKeyStatus::Unchecked));
        let handler = ClientHandler {
            host: host.clone(),
            port,
            accept_unknown: auth.accept_unknown_host_keys,
            status: status.clone(),
        };

        let mut handle = tokio::time::timeout(
            limits.connect_timeout(),
            client::connect(config, (host.as_str(), port), handler),
        )
        .await
        .map_err(|_| SessionError::ConnectTimeout(limits.connect_timeout()))?
        .map_err(|e| classify_connect_error(e, &status))?;

        authenticate(&mut handle, &username, &auth).await?;

        let shell = open_shell(&mut handle)
            .await
            .map_err(|e| SessionError::Protocol(e.to_string()))?;

        info!(session_id = %id, host = %host, port, user = %username, "session connected");
        let now = Utc::now();
        Ok(Arc::new(Self {
            id,
            host,
            port,
            username,
            created_at: now,
            last_used: Mutex::new((Instant::now(), now)),
            connected: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            limits,
            auth,
            runtime: tokio::sync::Mutex::new(Runtime {
                handle,
                shell: Some(shell),
                cwd: None,
                broken: false,
            }),
        }))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Seconds since the last command or transfer.
    pub fn idle_for(&self) -> Duration {
        self.last_used.lock().0.elapsed()
    }

    /// One row for `ssh_list_sessions`.
    pub fn summary(&self) -> SessionSummary {
        let last = self.last_used.lock();
        SessionSummary {
            id: self.id.clone(),
            host: self.host.clone(),
            user: self.username.clone(),
            created_at: self.created_at,
            last_used_at: last.1,
            idle_for: last.0.elapsed().as_secs(),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = (Instant::now(), Utc::now());
    }

    // ── run ──────────────────────────────────────────────────────────

    /// Execute one command on the interactive channel.
    ///
    /// Serialises on the session's in-flight lock; a concurrent call gets
    /// `Busy`, never queued. The command is validated by the policy engine
    /// before any channel I/O; a denial returns an outcome with no bytes
    /// sent and a `denied_reason`.
    pub async fn run(
        &self,
        policy: &PolicyEngine,
        prompts: &PendingPrompts,
        cmd: &str,
        timeout: Duration,
        sudo_password: Option<SecretString>,
    ) -> Result<ExecutionOutcome, SessionError> {
        let mut rt = self.runtime.try_lock().map_err(|_| SessionError::Busy)?;

        if !self.is_connected() {
            return Err(SessionError::Disconnected);
        }
        if rt.broken {
            return Err(SessionError::Broken);
        }

        let verdict = policy.validate(cmd);
        if !verdict.allowed {
            debug!(session_id = %self.id, reason = %verdict.reason, "command denied");
            self.touch();
            return Ok(ExecutionOutcome::denied(verdict.reason));
        }

        let started = Instant::now();
        let result = self
            .run_locked(&mut rt, prompts, cmd, timeout, sudo_password, started)
            .await;
        self.touch();
        result.map(|mut outcome| {
            outcome.duration_ms = started.elapsed().as_millis() as u64;
            outcome
        })
    }

    async fn run_locked(
        &self,
        rt: &mut Runtime,
        prompts: &PendingPrompts,
        cmd: &str,
        timeout: Duration,
        sudo_password: Option<SecretString>,
        started: Instant,
    ) -> Result<ExecutionOutcome, SessionError> {
        if rt.shell.is_none() {
            rt.broken = true;
            return Err(SessionError::Broken);
        }

        let token = sentinel_token();
        let wrapper = format!(
            "echo {token}; {cmd}; echo \"__RC_\"$?\"__\"; echo \"__CWD_\"$PWD\"__\"; echo {token}\n"
        );

        {
            let Some(shell) = rt.shell.as_ref() else {
                rt.broken = true;
                return Err(SessionError::Broken);
            };
            if shell.data(wrapper.as_bytes()).await.is_err() {
                rt.broken = true;
                rt.shell = None;
                return Err(SessionError::Broken);
            }
        }

        let mut capture = OutputCapture::new(
            token,
            self.limits.max_output_bytes,
            self.limits.max_output_lines,
        );
        let mut interposer = PromptInterposer::new(self.limits.prompt_window_bytes, cmd);
        let sudo_secret = self.auth.resolve_sudo(sudo_password.as_ref());

        let deadline = started + timeout;
        let watchdog_at = started + SUDO_WATCHDOG;
        let mut watchdog_armed = interposer.sudo_context()
            && matches!(sudo_secret, SudoSecret::Known(_));
        let mut drain_deadline: Option<Instant> = None;

        enum Step {
            Cancelled,
            Deadline,
            DrainExpired,
            Watchdog,
            Msg(Option<ChannelMsg>),
        }

        loop {
            if capture.finished() {
                break;
            }
            if capture.truncated() && drain_deadline.is_none() {
                drain_deadline = Some(Instant::now() + DRAIN_GRACE);
            }

            let step = {
                let Some(shell) = rt.shell.as_mut() else {
                    rt.broken = true;
                    return Err(SessionError::Broken);
                };
                let drain_at = drain_deadline.unwrap_or(deadline);
                tokio::select! {
                    _ = self.cancel.cancelled() => Step::Cancelled,
                    _ = tokio::time::sleep_until(deadline.into()) => Step::Deadline,
                    _ = tokio::time::sleep_until(drain_at.into()),
                        if drain_deadline.is_some() => Step::DrainExpired,
                    _ = tokio::time::sleep_until(watchdog_at.into()),
                        if watchdog_armed => Step::Watchdog,
                    msg = shell.wait() => Step::Msg(msg),
                }
            };

            match step {
                Step::Cancelled => {
                    rt.shell = None;
                    rt.broken = true;
                    return Err(SessionError::Disconnected);
                }
                Step::Deadline => {
                    warn!(session_id = %self.id, timeout_ms = timeout.as_millis() as u64, "command timed out");
                    self.reset_channel(rt).await;
                    let partial = capture.into_result();
                    return Ok(ExecutionOutcome {
                        stdout: partial.stdout,
                        stderr: partial.stderr,
                        exit_status: None,
                        duration_ms: 0,
                        truncated: partial.truncated,
                        timeout: true,
                        denied_reason: None,
                    });
                }
                Step::DrainExpired => {
                    // The sentinel never surfaced after the cap; the channel
                    // still carries command output and cannot be reused.
                    self.reset_channel(rt).await;
                    break;
                }
                Step::Watchdog => {
                    watchdog_armed = false;
                    if let SudoSecret::Known(pw) = &sudo_secret {
                        if interposer.mark_sudo_injected() {
                            debug!(session_id = %self.id, "proactive sudo injection");
                            self.write_secret(rt, pw).await?;
                        }
                    }
                }
                Step::Msg(None) => {
                    rt.shell = None;
                    rt.broken = true;
                    return Err(SessionError::Broken);
                }
                Step::Msg(Some(ChannelMsg::Data { data })) => {
                    capture.feed(&data);
                    if capture.has_command_output() {
                        watchdog_armed = false;
                    }
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if let Some(sighting) = interposer.feed(&text) {
                        self.handle_sighting(
                            rt,
                            prompts,
                            &mut interposer,
                            &sudo_secret,
                            sighting,
                            deadline,
                        )
                        .await?;
                    }
                }
                Step::Msg(Some(ChannelMsg::ExtendedData { data, .. })) => {
                    capture.feed_stderr(&data);
                    if capture.has_command_output() {
                        watchdog_armed = false;
                    }
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if let Some(sighting) = interposer.feed(&text) {
                        self.handle_sighting(
                            rt,
                            prompts,
                            &mut interposer,
                            &sudo_secret,
                            sighting,
                            deadline,
                        )
                        .await?;
                    }
                }
                Step::Msg(Some(ChannelMsg::Eof | ChannelMsg::Close)) => {
                    rt.shell = None;
                    rt.broken = true;
                    return Err(SessionError::Broken);
                }
                Step::Msg(Some(ChannelMsg::ExitStatus { .. })) => {
                    // The shell itself exited under us; terminal.
                    rt.shell = None;
                    rt.broken = true;
                    return Err(SessionError::Broken);
                }
                Step::Msg(Some(_)) => {}
            }
        }

        let result = capture.into_result();
        if let Some(cwd) = &result.cwd {
            rt.cwd = Some(cwd.clone());
        }
        Ok(ExecutionOutcome {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_status: result.exit_status,
            duration_ms: 0,
            truncated: result.truncated,
            timeout: false,
            denied_reason: None,
        })
    }

    /// React to a prompt the interposer recognised.
    async fn handle_sighting(
        &self,
        rt: &mut Runtime,
        prompts: &PendingPrompts,
        interposer: &mut PromptInterposer,
        sudo_secret: &SudoSecret,
        sighting: PromptSighting,
        deadline: Instant,
    ) -> Result<(), SessionError> {
        match sighting.style {
            PromptStyle::TerminalRequired => {
                // A failure notice, not a prompt: sudo will exit on its own.
                interposer.advance();
                Ok(())
            }
            PromptStyle::HostAuthenticity => {
                if self.auth.answer_host_key_prompts {
                    debug!(session_id = %self.id, "answering host authenticity prompt");
                    interposer.advance();
                    self.write_line(rt, "yes").await
                } else {
                    // Never inject a password into a yes/no question.
                    self.await_external_password(rt, prompts, interposer, sighting, deadline)
                        .await
                }
            }
            PromptStyle::Password => {
                let response = match sighting.kind {
                    PromptKind::Sudo | PromptKind::Generic => match sudo_secret {
                        SudoSecret::Known(pw) if interposer.mark_sudo_injected() => {
                            Some(pw.clone())
                        }
                        _ => None,
                    },
                    PromptKind::Ssh => match &self.auth.ssh_password {
                        Some(pw) if interposer.mark_ssh_injected() => Some(pw.clone()),
                        _ => None,
                    },
                };

                match response {
                    Some(pw) => {
                        debug!(session_id = %self.id, kind = ?sighting.kind, "injecting secret for prompt");
                        interposer.advance();
                        self.write_secret(rt, &pw).await
                    }
                    None => {
                        self.await_external_password(rt, prompts, interposer, sighting, deadline)
                            .await
                    }
                }
            }
        }
    }

    /// Register a pending prompt and suspend until it is resolved,
    /// cancelled, or expired.
    async fn await_external_password(
        &self,
        rt: &mut Runtime,
        prompts: &PendingPrompts,
        interposer: &mut PromptInterposer,
        sighting: PromptSighting,
        deadline: Instant,
    ) -> Result<(), SessionError> {
        if !self.auth.interactive_enabled {
            self.reset_channel(rt).await;
            return Err(SessionError::PasswordRequired(sighting.text));
        }

        let (request, rx) = prompts.register(&self.id, sighting.kind, &sighting.text);
        interposer.advance();

        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = remaining.min(prompts.ttl());
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(Some(password))) => self.write_secret(rt, &password).await,
            Ok(Ok(None)) | Ok(Err(_)) => {
                self.reset_channel(rt).await;
                Err(SessionError::PasswordRequired(sighting.text))
            }
            Err(_) => {
                prompts.forget(&request.request_id);
                self.reset_channel(rt).await;
                Err(SessionError::PasswordRequired(sighting.text))
            }
        }
    }

    async fn write_secret(&self, rt: &mut Runtime, secret: &SecretString) -> Result<(), SessionError> {
        self.write_line(rt, secret.expose()).await
    }

    async fn write_line(&self, rt: &mut Runtime, line: &str) -> Result<(), SessionError> {
        let Some(shell) = rt.shell.as_ref() else {
            rt.broken = true;
            return Err(SessionError::Broken);
        };
        let payload = format!("{line}\n");
        if shell.data(payload.as_bytes()).await.is_err() {
            rt.shell = None;
            rt.broken = true;
            return Err(SessionError::Broken);
        }
        Ok(())
    }

    /// Kill the interactive channel and open a fresh one, restoring the
    /// tracked working directory best-effort.
    async fn reset_channel(&self, rt: &mut Runtime) {
        if let Some(channel) = rt.shell.take() {
            let _ = channel.close().await;
        }
        match open_shell(&mut rt.handle).await {
            Ok(channel) => {
                if let Some(cwd) = &rt.cwd {
                    let escaped = cwd.replace('\'', r"'\''");
                    let _ = channel
                        .data(format!("cd '{escaped}' >/dev/null 2>&1\n").as_bytes())
                        .await;
                }
                rt.shell = Some(channel);
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "channel reset failed");
                rt.broken = true;
            }
        }
    }

    // ── file transfer ────────────────────────────────────────────────

    /// Upload bytes to a remote path over a fresh SFTP channel.
    pub async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        transfer: &TransferConfig,
    ) -> Result<usize, SessionError> {
        check_path(path, &transfer.allowed_prefixes)?;
        if bytes.len() > transfer.max_upload_bytes {
            return Err(SessionError::transfer(
                TransferErrorKind::TooLarge,
                format!(
                    "payload is {} bytes, cap is {}",
                    bytes.len(),
                    transfer.max_upload_bytes
                ),
            ));
        }

        let mut rt = self.runtime.try_lock().map_err(|_| SessionError::Busy)?;
        if rt.broken {
            return Err(SessionError::Broken);
        }

        let sftp = open_sftp(&mut rt.handle).await?;
        let mut file = sftp.create(path).await.map_err(|e| {
            SessionError::transfer(TransferErrorKind::WriteFailed, e.to_string())
        })?;
        file.write_all(bytes).await.map_err(|e| {
            SessionError::transfer(TransferErrorKind::WriteFailed, e.to_string())
        })?;
        file.shutdown().await.map_err(|e| {
            SessionError::transfer(TransferErrorKind::WriteFailed, e.to_string())
        })?;

        drop(rt);
        self.touch();
        info!(session_id = %self.id, path, bytes = bytes.len(), "upload complete");
        Ok(bytes.len())
    }

    /// Download up to `max_bytes` from a remote path over a fresh SFTP
    /// channel. Returns the bytes and whether the file was truncated.
    pub async fn download(
        &self,
        path: &str,
        max_bytes: usize,
        transfer: &TransferConfig,
    ) -> Result<(Vec<u8>, bool), SessionError> {
        check_path(path, &transfer.allowed_prefixes)?;

        let mut rt = self.runtime.try_lock().map_err(|_| SessionError::Busy)?;
        if rt.broken {
            return Err(SessionError::Broken);
        }

        let sftp = open_sftp(&mut rt.handle).await?;
        let mut file = sftp.open(path).await.map_err(|e| {
            SessionError::transfer(TransferErrorKind::ReadFailed, e.to_string())
        })?;

        let mut out = Vec::new();
        let mut buf = vec![0u8; 8192];
        let mut truncated = false;
        loop {
            let n = file.read(&mut buf).await.map_err(|e| {
                SessionError::transfer(TransferErrorKind::ReadFailed, e.to_string())
            })?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
            if out.len() > max_bytes {
                out.truncate(max_bytes);
                truncated = true;
                break;
            }
        }

        drop(rt);
        self.touch();
        info!(session_id = %self.id, path, bytes = out.len(), truncated, "download complete");
        Ok((out, truncated))
    }

    // ── teardown ─────────────────────────────────────────────────────

    /// Close channels and transport. Idempotent; interrupts an active run.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        // Waits for an in-flight run to observe the cancellation.
        let mut rt = self.runtime.lock().await;
        if let Some(channel) = rt.shell.take() {
            let _ = channel.close().await;
        }
        let _ = rt
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await;
        rt.broken = true;
        info!(session_id = %self.id, "session disconnected");
    }
}

// ── helpers ──────────────────────────────────────────────────────────────

/// A fresh 16-byte random token, hex encoded.
fn sentinel_token() -> String {
    use std::fmt::Write;

    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    let mut token = String::with_capacity(32);
    for b in bytes {
        let _ = write!(token, "{b:02x}");
    }
    token
}

async fn open_shell(
    handle: &mut client::Handle<ClientHandler>,
) -> Result<Channel<Msg>, russh::Error> {
    let channel = handle.channel_open_session().await?;
    channel.request_pty(true, "xterm", 800, 120, 0, 0, &[]).await?;
    channel.request_shell(true).await?;
    Ok(channel)
}

async fn open_sftp(
    handle: &mut client::Handle<ClientHandler>,
) -> Result<russh_sftp::client::SftpSession, SessionError> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| SessionError::Protocol(e.to_string()))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| SessionError::Protocol(e.to_string()))?;
    russh_sftp::client::SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| SessionError::Protocol(e.to_string()))
}

async fn authenticate(
    handle: &mut client::Handle<ClientHandler>,
    username: &str,
    auth: &AuthMaterial,
) -> Result<(), SessionError> {
    let mut attempts: Vec<String> = Vec::new();

    if let Some(key_path) = &auth.key_path {
        let key = russh_keys::load_secret_key(key_path, None).map_err(|e| {
            SessionError::AuthFailed(format!("cannot load key {}: {e}", key_path.display()))
        })?;
        let accepted = handle
            .authenticate_publickey(username, Arc::new(key))
            .await
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?;
        if accepted {
            return Ok(());
        }
        attempts.push("publickey".to_string());
    }

    if let Some(password) = &auth.ssh_password {
        let accepted = handle
            .authenticate_password(username, password.expose())
            .await
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?;
        if accepted {
            return Ok(());
        }
        attempts.push("password".to_string());

        if keyboard_interactive(handle, username, password.expose())
            .await
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?
        {
            return Ok(());
        }
        attempts.push("keyboard-interactive".to_string());
    }

    if attempts.is_empty() {
        return Err(SessionError::AuthFailed(
            "no authentication material configured".to_string(),
        ));
    }
    Err(SessionError::AuthFailed(format!(
        "all methods rejected: {}",
        attempts.join(", ")
    )))
}

async fn keyboard_interactive(
    handle: &mut client::Handle<ClientHandler>,
    username: &str,
    password: &str,
) -> Result<bool, russh::Error> {
    use russh::client::KeyboardInteractiveAuthResponse as Response;

    let mut response = handle
        .authenticate_keyboard_interactive_start(username, None)
        .await?;
    for _ in 0..3 {
        match response {
            Response::Success => return Ok(true),
            Response::Failure => return Ok(false),
            Response::InfoRequest { prompts, .. } => {
                let answers = prompts.iter().map(|_| password.to_string()).collect();
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await?;
            }
            _ => return Ok(false),
        }
    }
    Ok(false)
}

fn classify_connect_error(
    e: russh::Error,
    status: &Arc<Mutex<HostKeyStatus>>,
) -> SessionError {
    match e {
        russh::Error::UnknownKey => match *status.lock() {
            HostKeyStatus::Mismatch => SessionError::HostKeyMismatch(
                "server key differs from the recorded known_hosts entry".to_string(),
            ),
            _ => SessionError::HostKeyMismatch("unknown host key rejected".to_string()),
        },
        russh::Error::IO(io) => SessionError::NetworkUnreachable(io.to_string()),
        other => SessionError::Protocol(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_tokens_are_32_hex_chars_and_unique() {
        let a = sentinel_token();
        let b = sentinel_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
