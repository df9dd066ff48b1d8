//! Tool handlers: one plain async function per [`ToolKind`].
//!
//! Each handler extracts its parameters from the raw JSON arguments,
//! calls into the session runtime, and builds the documented result
//! envelope. Failures become `{success: false, error: <kind>, details}`;
//! secrets never reach the envelope (and the dispatcher's redaction
//! middleware backstops that).

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::warn;

use bosun_session::SshSession;
use bosun_types::secret::SecretString;
use bosun_types::{AuthMaterial, ErrorKind};

use crate::context::ServerContext;
use crate::tools::ToolKind;

/// Dispatch one tool call to its handler. The explicit match is the whole
/// routing table.
pub async fn handle(ctx: &Arc<ServerContext>, kind: ToolKind, args: &Value) -> Value {
    match kind {
        ToolKind::Connect => connect(ctx, args).await,
        ToolKind::Run => run(ctx, args).await,
        ToolKind::Upload => upload(ctx, args).await,
        ToolKind::Download => download(ctx, args).await,
        ToolKind::ListSessions => list_sessions(ctx),
        ToolKind::Disconnect => disconnect(ctx, args).await,
        ToolKind::PermissibilityInfo => permissibility_info(ctx),
        ToolKind::ListPasswordRequests => list_password_requests(ctx),
        ToolKind::ProvidePassword => provide_password(ctx, args),
        ToolKind::CancelPasswordRequest => cancel_password_request(ctx, args),
    }
}

// ── envelope helpers ─────────────────────────────────────────────────────

fn error_envelope(kind: ErrorKind, details: impl Into<String>) -> Value {
    json!({
        "success": false,
        "error": kind.as_str(),
        "details": details.into(),
    })
}

fn invalid(details: impl Into<String>) -> Value {
    error_envelope(ErrorKind::InvalidRequest, details)
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, Value> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid(format!("missing required parameter: {key}")))
}

fn session_error(e: bosun_session::SessionError) -> Value {
    error_envelope(e.kind(), e.to_string())
}

// ── connect ──────────────────────────────────────────────────────────────

async fn connect(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let host = match args.get("host").and_then(Value::as_str) {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => match &ctx.config.auth.host {
            Some(h) => h.clone(),
            None => return invalid("missing required parameter: host"),
        },
    };
    let username = match args.get("username").and_then(Value::as_str) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => match &ctx.config.auth.username {
            Some(u) => u.clone(),
            None => return invalid("missing required parameter: username"),
        },
    };
    let port = match args.get("port") {
        Some(v) => match v.as_u64().and_then(|p| u16::try_from(p).ok()) {
            Some(p) => p,
            None => return invalid("port must be an integer in 1..=65535"),
        },
        None => ctx.config.auth.port.unwrap_or(22),
    };

    let mut auth = AuthMaterial::from_config(&ctx.config.auth);
    if let Some(call_auth) = args.get("auth") {
        if let Some(key_path) = call_auth.get("key_path").and_then(Value::as_str) {
            auth.key_path = Some(key_path.into());
        }
        if let Some(password) = call_auth.get("password").and_then(Value::as_str) {
            auth.ssh_password = Some(SecretString::new(password));
        }
    }

    let session_id = match args.get("session_id").and_then(Value::as_str) {
        Some(id) => {
            if id.len() < 8
                || !id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return invalid("session_id must be at least 8 url-safe characters");
            }
            id.to_string()
        }
        None => ctx.registry.new_id(),
    };

    if !ctx.registry.has_capacity() {
        return error_envelope(
            ErrorKind::MaxSessionsReached,
            format!("registry holds {} sessions", ctx.registry.len()),
        );
    }

    let session = match SshSession::connect(
        session_id.clone(),
        host.clone(),
        port,
        username.clone(),
        auth,
        ctx.config.limits.clone(),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            warn!(host = %host, error = %e, "connect failed");
            return session_error(e);
        }
    };

    if let Err(e) = ctx.registry.insert(session.clone()) {
        session.disconnect().await;
        return session_error(e);
    }

    json!({
        "success": true,
        "session_id": session_id,
        "message": format!("connected to {username}@{host}:{port}"),
    })
}

// ── run ──────────────────────────────────────────────────────────────────

async fn run(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let session_id = match required_str(args, "session_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cmd = match required_str(args, "cmd") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let timeout_ms = args
        .get("timeout_ms")
        .and_then(Value::as_u64)
        .unwrap_or(ctx.config.limits.command_timeout_ms);
    let sudo_password = args
        .get("sudo_password")
        .and_then(Value::as_str)
        .map(SecretString::new);

    let Some(session) = ctx.registry.get(session_id) else {
        return error_envelope(ErrorKind::NotFound, format!("no such session: {session_id}"));
    };

    let outcome = match session
        .run(
            &ctx.policy,
            &ctx.prompts,
            cmd,
            Duration::from_millis(timeout_ms),
            sudo_password,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return session_error(e),
    };

    if let Some(reason) = &outcome.denied_reason {
        return json!({
            "success": false,
            "session_id": session_id,
            "error": ErrorKind::Denied.as_str(),
            "stdout": "",
            "stderr": "",
            "exit_status": Value::Null,
            "duration_ms": outcome.duration_ms,
            "denied_reason": reason,
        });
    }

    json!({
        "success": true,
        "session_id": session_id,
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
        "exit_status": outcome.exit_status,
        "duration_ms": outcome.duration_ms,
        "truncated": outcome.truncated,
        "timeout": outcome.timeout,
    })
}

// ── file transfer ────────────────────────────────────────────────────────

async fn upload(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let session_id = match required_str(args, "session_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let path = match required_str(args, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let encoded = match required_str(args, "bytes_base64") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let bytes = match BASE64.decode(encoded) {
        Ok(b) => b,
        Err(e) => return invalid(format!("bytes_base64 is not valid base64: {e}")),
    };

    let Some(session) = ctx.registry.get(session_id) else {
        return error_envelope(ErrorKind::NotFound, format!("no such session: {session_id}"));
    };

    match session.upload(path, &bytes, &ctx.config.transfer).await {
        Ok(written) => json!({ "success": true, "bytes_written": written }),
        Err(e) => session_error(e),
    }
}

async fn download(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let session_id = match required_str(args, "session_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let path = match required_str(args, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let max_bytes = args
        .get("max_bytes")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(ctx.config.transfer.max_download_bytes);

    let Some(session) = ctx.registry.get(session_id) else {
        return error_envelope(ErrorKind::NotFound, format!("no such session: {session_id}"));
    };

    match session.download(path, max_bytes, &ctx.config.transfer).await {
        Ok((bytes, truncated)) => json!({
            "success": true,
            "bytes_base64": BASE64.encode(&bytes),
            "truncated": truncated,
        }),
        Err(e) => session_error(e),
    }
}

// ── session lifecycle ────────────────────────────────────────────────────

fn list_sessions(ctx: &Arc<ServerContext>) -> Value {
    json!({ "sessions": ctx.registry.list() })
}

async fn disconnect(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let session_id = match required_str(args, "session_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(session) = ctx.registry.remove(session_id) else {
        return error_envelope(ErrorKind::NotFound, format!("no such session: {session_id}"));
    };
    session.disconnect().await;
    json!({
        "success": true,
        "message": format!("session {session_id} disconnected"),
    })
}

// ── policy and prompts ───────────────────────────────────────────────────

fn permissibility_info(ctx: &Arc<ServerContext>) -> Value {
    let info = ctx.policy.info();
    json!({
        "level": info.level,
        "allowed_count": info.allowed_count,
        "always_denied_count": info.always_denied_count,
        "patterns_active": info.patterns_active,
    })
}

fn list_password_requests(ctx: &Arc<ServerContext>) -> Value {
    let requests = ctx.prompts.list();
    json!({
        "count": requests.len(),
        "requests": requests,
    })
}

fn provide_password(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let request_id = match required_str(args, "request_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(args, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if ctx.prompts.resolve(request_id, SecretString::new(password)) {
        json!({ "success": true, "message": format!("password delivered for {request_id}") })
    } else {
        error_envelope(
            ErrorKind::NotFound,
            format!("no pending password request: {request_id}"),
        )
    }
}

fn cancel_password_request(ctx: &Arc<ServerContext>, args: &Value) -> Value {
    let request_id = match required_str(args, "request_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if ctx.prompts.cancel(request_id) {
        json!({ "success": true, "message": format!("request {request_id} cancelled") })
    } else {
        error_envelope(
            ErrorKind::NotFound,
            format!("no pending password request: {request_id}"),
        )
    }
}
