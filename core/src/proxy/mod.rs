// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend Proxy: forwards one authorized tool call to its backend over
//! HTTP with shared-secret auth. Grounded on
//! `examples/original_source/src/gateway/proxy.py`'s `forward_to_backend`
//! and `forward_tool_call`.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::mcp::schema::{MCPRequest, MCPResponse, MCPToolCallParams};

const BODY_TRUNCATE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("backend {backend_url} did not respond within {timeout_seconds}s")]
    Timeout { backend_url: String, timeout_seconds: u64 },
    #[error("backend {backend_url} is unavailable: {reason}")]
    Unavailable { backend_url: String, reason: String },
    #[error("backend {backend_url} returned status {status}: {body_truncated}")]
    BackendStatus {
        backend_url: String,
        status: u16,
        body_truncated: String,
    },
    #[error("gateway shared secret is not configured")]
    SecretNotConfigured,
}

/// Forwards one already-authorized tool call to its backend over HTTP,
/// attaching the gateway's shared secret so backends can trust requests
/// came through the gateway rather than directly from the internet.
pub struct BackendProxy {
    client: Client,
    shared_secret: String,
    timeout: Duration,
}

impl BackendProxy {
    pub fn new(shared_secret: impl Into<String>, timeout: Duration) -> Self {
        BackendProxy {
            client: Client::new(),
            shared_secret: shared_secret.into(),
            timeout,
        }
    }

    /// Fails closed when no shared secret is configured, rather than
    /// forwarding an unauthenticated request.
    pub async fn forward_tool_call(
        &self,
        backend_url: &str,
        tool_name: &str,
        arguments: Value,
        request_id: Uuid,
        user_id: Option<&str>,
    ) -> Result<MCPResponse, ProxyError> {
        if self.shared_secret.is_empty() {
            return Err(ProxyError::SecretNotConfigured);
        }

        let body = MCPRequest {
            jsonrpc: "2.0".to_string(),
            method: "tools/call".to_string(),
            params: Some(serde_json::to_value(MCPToolCallParams {
                name: tool_name.to_string(),
                arguments,
            }).expect("MCPToolCallParams always serializes")),
            id: Some(Value::String(request_id.to_string())),
        };

        let mut request = self
            .client
            .post(backend_url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("X-Request-ID", request_id.to_string())
            .header("X-Gateway-Auth", &self.shared_secret)
            .json(&body);
        if let Some(user_id) = user_id {
            request = request.header("X-User-ID", user_id);
        }

        let response = request.send().await.map_err(|e| self.classify(backend_url, e))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let text = response.text().await.unwrap_or_default();
            let truncated: String = text.chars().take(BODY_TRUNCATE_LEN).collect();
            return Err(ProxyError::BackendStatus {
                backend_url: backend_url.to_string(),
                status: status.as_u16(),
                body_truncated: truncated,
            });
        }

        response
            .json::<MCPResponse>()
            .await
            .map_err(|e| ProxyError::Unavailable {
                backend_url: backend_url.to_string(),
                reason: format!("malformed backend response: {e}"),
            })
    }

    fn classify(&self, backend_url: &str, error: reqwest::Error) -> ProxyError {
        if error.is_timeout() {
            ProxyError::Timeout {
                backend_url: backend_url.to_string(),
                timeout_seconds: self.timeout.as_secs(),
            }
        } else if error.is_connect() {
            ProxyError::Unavailable {
                backend_url: backend_url.to_string(),
                reason: "connection refused".to_string(),
            }
        } else {
            ProxyError::Unavailable {
                backend_url: backend_url.to_string(),
                reason: error.to_string(),
            }
        }
    }
}
