//! # bosun-server
//!
//! The MCP tool dispatcher: JSON-RPC 2.0 over newline-delimited streams
//! ([`server`]), a tagged tool surface with explicit routing ([`tools`],
//! [`handlers`]), the shared context record ([`context`]), and the result
//! post-processing pipeline ([`middleware`]).

pub mod context;
pub mod handlers;
pub mod middleware;
pub mod rpc;
pub mod server;
pub mod tools;

pub use context::ServerContext;
pub use middleware::{AuditLog, Middleware, SecretRedactor};
pub use rpc::{CallToolResult, ContentBlock};
pub use server::ServerShell;
pub use tools::{ToolDefinition, ToolKind};
