//! JSON-RPC 2.0 wire types for the MCP transport.
//!
//! Request ids are kept as raw [`serde_json::Value`]s: MCP clients send
//! both numbers and strings and the id is only ever echoed back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error codes used by the server shell.
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const NOT_INITIALIZED: i32 = -32002;
pub const INVALID_REQUEST: i32 = -32600;

/// An incoming JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Request identifier; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    #[serde(default)]
    pub method: String,
    /// Method parameters.
    #[serde(default = "default_params")]
    pub params: Value,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Build a JSON-RPC success response.
pub fn success_response(id: Value, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

/// Build a JSON-RPC error response.
pub fn error_response(id: Value, code: i32, message: &str) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message
        }
    })
}

// ── Tool call results ────────────────────────────────────────────────────

/// A single content block returned by a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text content.
    #[serde(rename = "text")]
    Text { text: String },
}

/// The result of calling a tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    /// Content blocks produced by the tool.
    pub content: Vec<ContentBlock>,
    /// Whether the tool execution resulted in an error.
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// Convenience constructor for a successful text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Convenience constructor for an error text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_string_and_numeric_ids() {
        let r: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#).unwrap();
        assert_eq!(r.id, Some(serde_json::json!(7)));
        assert!(r.params.is_object());

        let r: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"x"}"#).unwrap();
        assert_eq!(r.id, Some(serde_json::json!("abc")));
    }

    #[test]
    fn notifications_have_no_id() {
        let r: Request =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(r.id.is_none());
    }

    #[test]
    fn call_result_serializes_mcp_shape() {
        let result = CallToolResult::error("boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isError"], serde_json::json!(true));
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "boom");
    }
}
