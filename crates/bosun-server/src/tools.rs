//! The tool surface: a tagged kind per tool plus the MCP definitions.
//!
//! Dispatch is an explicit match over [`ToolKind`]; handlers are plain
//! functions over the shared server context (see [`crate::handlers`]),
//! so a fresh core can be instantiated per test with no global state.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Definition of an MCP tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    #[serde(rename = "inputSchema", alias = "input_schema")]
    pub input_schema: serde_json::Value,
}

/// Every tool the broker exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Connect,
    Run,
    Upload,
    Download,
    ListSessions,
    Disconnect,
    PermissibilityInfo,
    ListPasswordRequests,
    ProvidePassword,
    CancelPasswordRequest,
}

impl ToolKind {
    /// All tools, in the order they are listed to clients.
    pub const ALL: [ToolKind; 10] = [
        Self::Connect,
        Self::Run,
        Self::Upload,
        Self::Download,
        Self::ListSessions,
        Self::Disconnect,
        Self::PermissibilityInfo,
        Self::ListPasswordRequests,
        Self::ProvidePassword,
        Self::CancelPasswordRequest,
    ];

    /// Wire name of this tool.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "ssh_connect",
            Self::Run => "ssh_run",
            Self::Upload => "ssh_upload",
            Self::Download => "ssh_download",
            Self::ListSessions => "ssh_list_sessions",
            Self::Disconnect => "ssh_disconnect",
            Self::PermissibilityInfo => "ssh_get_permissibility_info",
            Self::ListPasswordRequests => "ssh_list_password_requests",
            Self::ProvidePassword => "ssh_provide_password",
            Self::CancelPasswordRequest => "ssh_cancel_password_request",
        }
    }

    /// Resolve a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// MCP definitions for every tool.
    pub fn definitions() -> Vec<ToolDefinition> {
        Self::ALL.into_iter().map(Self::definition).collect()
    }

    fn definition(self) -> ToolDefinition {
        let (description, input_schema) = match self {
            Self::Connect => (
                "Establish an SSH session to a remote host. Returns a session id for subsequent calls.",
                json!({
                    "type": "object",
                    "properties": {
                        "host": { "type": "string", "description": "Remote host name or address" },
                        "username": { "type": "string", "description": "Login user" },
                        "port": { "type": "number", "description": "SSH port (default 22)" },
                        "auth": {
                            "type": "object",
                            "properties": {
                                "key_path": { "type": "string", "description": "Path to a private key file" },
                                "password": { "type": "string", "description": "SSH password" }
                            }
                        },
                        "session_id": { "type": "string", "description": "Caller-chosen session id (min 8 chars)" }
                    },
                    "required": ["host", "username"]
                }),
            ),
            Self::Run => (
                "Run a shell command on an established session. Commands are validated against the active permissibility tier before execution.",
                json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "cmd": { "type": "string", "description": "The command to execute" },
                        "timeout_ms": { "type": "number", "description": "Wall-clock timeout in milliseconds (default 30000)" },
                        "sudo_password": { "type": "string", "description": "Password for sudo prompts on this call" }
                    },
                    "required": ["session_id", "cmd"]
                }),
            ),
            Self::Upload => (
                "Upload base64-encoded bytes to a remote path under the transfer allow-list.",
                json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "path": { "type": "string", "description": "Absolute remote path" },
                        "bytes_base64": { "type": "string", "description": "File content, base64 encoded" }
                    },
                    "required": ["session_id", "path", "bytes_base64"]
                }),
            ),
            Self::Download => (
                "Download a remote file under the transfer allow-list, base64 encoded.",
                json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "path": { "type": "string", "description": "Absolute remote path" },
                        "max_bytes": { "type": "number", "description": "Byte cap (default 65536)" }
                    },
                    "required": ["session_id", "path"]
                }),
            ),
            Self::ListSessions => (
                "List live SSH sessions.",
                json!({ "type": "object", "properties": {} }),
            ),
            Self::Disconnect => (
                "Tear down an SSH session.",
                json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" }
                    },
                    "required": ["session_id"]
                }),
            ),
            Self::PermissibilityInfo => (
                "Describe the active permissibility tier and policy table sizes.",
                json!({ "type": "object", "properties": {} }),
            ),
            Self::ListPasswordRequests => (
                "List pending password prompts awaiting an answer.",
                json!({ "type": "object", "properties": {} }),
            ),
            Self::ProvidePassword => (
                "Answer a pending password prompt.",
                json!({
                    "type": "object",
                    "properties": {
                        "request_id": { "type": "string" },
                        "password": { "type": "string" }
                    },
                    "required": ["request_id", "password"]
                }),
            ),
            Self::CancelPasswordRequest => (
                "Cancel a pending password prompt; the waiting command fails promptly.",
                json!({
                    "type": "object",
                    "properties": {
                        "request_id": { "type": "string" }
                    },
                    "required": ["request_id"]
                }),
            ),
        };
        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_roundtrip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("ssh_rm_rf"), None);
    }

    #[test]
    fn definitions_cover_every_tool() {
        let defs = ToolKind::definitions();
        assert_eq!(defs.len(), ToolKind::ALL.len());
        for def in &defs {
            assert!(def.name.starts_with("ssh_"));
            assert_eq!(def.input_schema["type"], "object");
        }
    }

    #[test]
    fn run_schema_requires_session_and_cmd() {
        let defs = ToolKind::definitions();
        let run = defs.iter().find(|d| d.name == "ssh_run").unwrap();
        let required = run.input_schema["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("session_id")));
        assert!(required.contains(&serde_json::json!("cmd")));
    }
}
