//! MCP server shell: newline-delimited JSON-RPC over generic streams.
//!
//! [`ServerShell`] is generic over `AsyncBufRead + AsyncWrite` so it can
//! be driven by stdio in production and by in-memory buffers in tests.
//!
//! Handles the `initialize` handshake, `tools/list`, `tools/call`, and
//! `notifications/initialized`. Unknown methods receive `-32601 Method
//! not found`; requests before `initialize` receive `-32002 Server not
//! initialized`.
//!
//! Every `tools/call` runs on its own spawned task so a slow `ssh_run`
//! on one session never blocks an `ssh_list_sessions` on another; results
//! are funnelled back to the single writer through a channel. Per-session
//! ordering is still enforced by the session's in-flight lock.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::context::ServerContext;
use crate::handlers;
use crate::middleware::Middleware;
use crate::rpc::{
    CallToolResult, ContentBlock, INVALID_REQUEST, METHOD_NOT_FOUND, NOT_INITIALIZED, Request,
    error_response, success_response,
};
use crate::tools::ToolKind;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "bosun";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// An MCP server that reads newline-delimited JSON-RPC from a reader and
/// writes responses to a writer.
pub struct ServerShell {
    ctx: Arc<ServerContext>,
    middlewares: Vec<Arc<dyn Middleware>>,
    initialized: bool,
}

impl ServerShell {
    /// Create a new server shell over the given context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self {
            ctx,
            middlewares: Vec::new(),
            initialized: false,
        }
    }

    /// Add a middleware to the result pipeline.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Run the server loop until the reader reaches EOF, then drain every
    /// in-flight call before returning.
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::channel::<Value>(32);
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                Some(response) = rx.recv() => {
                    write_response(&mut writer, &response).await?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(response) = self.handle_line(line, &tx) {
                        write_response(&mut writer, &response).await?;
                    }
                }
            }
        }

        // EOF: drop our sender so the drain below ends once every spawned
        // call has reported in.
        drop(tx);
        while let Some(response) = rx.recv().await {
            write_response(&mut writer, &response).await?;
        }
        debug!("reader closed, server shell finished");
        Ok(())
    }

    fn handle_line(&mut self, line: &str, tx: &mpsc::Sender<Value>) -> Option<Value> {
        let request: Request = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(_) => {
                return Some(error_response(Value::Null, INVALID_REQUEST, "Parse error"));
            }
        };
        let Request { id, method, params } = request;
        let is_notification = id.is_none();

        match method.as_str() {
            "initialize" => {
                self.initialized = true;
                let result = json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": { "listChanged": false }
                    },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": SERVER_VERSION
                    }
                });
                id.map(|id| success_response(id, result))
            }

            "notifications/initialized" => None,

            _ if !self.initialized => (!is_notification).then(|| {
                error_response(
                    id.unwrap_or(Value::Null),
                    NOT_INITIALIZED,
                    "Server not initialized",
                )
            }),

            "tools/list" => {
                let result = json!({ "tools": ToolKind::definitions() });
                id.map(|id| success_response(id, result))
            }

            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = params
                    .get("arguments")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));

                let ctx = self.ctx.clone();
                let middlewares = self.middlewares.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = dispatch_call(&ctx, &middlewares, &name, args).await;
                    let value = serde_json::to_value(&result).unwrap_or(Value::Null);
                    if let Some(id) = id {
                        let _ = tx.send(success_response(id, value)).await;
                    }
                });
                None
            }

            _ => (!is_notification).then(|| {
                error_response(
                    id.unwrap_or(Value::Null),
                    METHOD_NOT_FOUND,
                    &format!("Method not found: {method}"),
                )
            }),
        }
    }
}

/// Route one tool call through its handler and the middleware pipeline.
pub async fn dispatch_call(
    ctx: &Arc<ServerContext>,
    middlewares: &[Arc<dyn Middleware>],
    name: &str,
    args: Value,
) -> CallToolResult {
    let mut result = match ToolKind::from_name(name) {
        None => CallToolResult::error(format!("unknown tool: {name}")),
        Some(kind) => {
            let envelope = handlers::handle(ctx, kind, &args).await;
            let success = envelope
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
            CallToolResult {
                content: vec![ContentBlock::Text { text }],
                is_error: !success,
            }
        }
    };

    for middleware in middlewares {
        result = middleware.after_call(name, result).await;
    }
    result
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Value,
) -> std::io::Result<()> {
    let mut line = serde_json::to_string(response).map_err(std::io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────
