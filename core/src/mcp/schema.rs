// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JSON-RPC 2.0 envelope and error-code table. Grounded on
//! `examples/original_source/src/gateway/schemas.py`'s `MCPRequest`,
//! `MCPResponse`, `MCPErrorDetail`, and `MCPErrorCodes`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPErrorDetail {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl MCPResponse {
    pub fn success(result: Value, id: Option<Value>) -> Self {
        MCPResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error_response(code: i64, message: impl Into<String>, id: Option<Value>) -> Self {
        MCPResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(MCPErrorDetail {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }
}

/// One entry in a `tools/list` response — the MCP wire shape, distinct
/// from [`crate::domain::Tool`] (the registry's full row). Built via
/// [`ToolSummary::from_tool`] so listing code never hand-assembles this
/// shape inline.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolSummary {
    pub fn from_tool<T: crate::domain::ToolLike>(tool: &T) -> Self {
        ToolSummary {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool
                .input_schema()
                .cloned()
                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
        }
    }
}

/// JSON-RPC standard codes plus the gateway-specific extensions.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const TOOL_NOT_FOUND: i64 = -32001;
    pub const PERMISSION_DENIED: i64 = -32002;
    pub const BACKEND_TIMEOUT: i64 = -32003;
    pub const BACKEND_UNAVAILABLE: i64 = -32004;
    pub const PAYLOAD_TOO_LARGE: i64 = -32005;
    pub const INVALID_SCOPE: i64 = -32010;
    pub const TOOL_NOT_IN_SCOPE: i64 = -32011;
    pub const META_TOOL_REMOVED: i64 = -32012;
}
