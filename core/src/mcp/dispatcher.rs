// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Scoped MCP dispatcher. Grounded on
//! `examples/original_source/src/mcp_transport/service.py`'s
//! `handle_initialize`, `handle_tools_list` (the v2 scoped path, not the
//! legacy `handle_tools_list_smart` strategy fan-out — see DESIGN.md's
//! open-question decisions) and `handle_tools_call`.
//!
//! Rate limiting and the tool's own-scope check both happen here, before
//! [`crate::gateway::GatewayService`] is ever called. A denial at either
//! point is logged directly via [`crate::audit::log_denied_with_status`]
//! since no [`crate::audit::AuditScope`] is opened for an invocation that
//! never reaches the gateway service.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::audit::{log_denied_with_status, AuditSink};
use crate::domain::{AuditStatus, AuthenticatedUser, ToolLike};
use crate::error::GatewayError;
use crate::gateway::GatewayService;
use crate::policy::PolicyEngine;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::registry::ToolRegistry;

use super::schema::{error_codes, MCPRequest, MCPResponse, MCPToolCallParams, ToolSummary};

/// v1 meta-tools retired in v2: never listed, always rejected on
/// `tools/call` with `-32012`.
const META_TOOLS: [&str; 2] = ["find_tools", "call_tool"];

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Shared state the dispatcher needs per request. Constructed once at
/// startup and handed to every scoped route handler.
pub struct DispatcherDeps {
    pub registry: Arc<ToolRegistry>,
    pub policy: Arc<PolicyEngine>,
    pub rate_limiter: Arc<RateLimiter>,
    pub gateway: Arc<GatewayService>,
    pub audit_sink: Arc<dyn AuditSink>,
    pub user_rate_limit: RateLimitConfig,
    pub tool_rate_limit: RateLimitConfig,
    pub server_name: String,
    pub server_version: String,
}

pub struct Dispatcher {
    deps: DispatcherDeps,
}

#[derive(Serialize)]
struct ServerInfo {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct ToolsCapability {
    #[serde(rename = "listChanged")]
    list_changed: bool,
}

#[derive(Serialize)]
struct Capabilities {
    tools: ToolsCapability,
}

#[derive(Serialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
}

#[derive(Serialize)]
struct ToolsListResult {
    tools: Vec<ToolSummary>,
}

impl Dispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Dispatcher { deps }
    }

    /// Dispatch one JSON-RPC request already known to belong to a valid
    /// `scope` (the HTTP layer rejects an unknown scope with `-32010`
    /// before this is ever called). Returns `Ok(None)` for a
    /// notification (no response body), `Ok(Some(_))` for every JSON-RPC
    /// envelope response (HTTP 200, error or not), and `Err(_)` only for
    /// the rate-limit case, which the HTTP layer maps to 429 instead of
    /// wrapping in an envelope.
    pub async fn handle(
        &self,
        scope: &str,
        user: &AuthenticatedUser,
        endpoint_path: &str,
        request: MCPRequest,
    ) -> Result<Option<MCPResponse>, GatewayError> {
        match request.method.as_str() {
            "initialize" => Ok(Some(self.handle_initialize(request.id))),
            "notifications/initialized" => Ok(None),
            "tools/list" => Ok(Some(self.handle_tools_list(scope, user, request.id).await)),
            "tools/call" => self.handle_tools_call(scope, user, endpoint_path, request.id, request.params).await,
            _ => Ok(Some(MCPResponse::error_response(
                error_codes::METHOD_NOT_FOUND,
                format!("method {:?} not found", request.method),
                request.id,
            ))),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> MCPResponse {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: Capabilities {
                tools: ToolsCapability { list_changed: false },
            },
            server_info: ServerInfo {
                name: self.deps.server_name.clone(),
                version: self.deps.server_version.clone(),
            },
        };
        MCPResponse::success(
            serde_json::to_value(result).expect("InitializeResult always serializes"),
            id,
        )
    }

    async fn handle_tools_list(&self, scope: &str, user: &AuthenticatedUser, id: Option<Value>) -> MCPResponse {
        let tools = match self
            .deps
            .registry
            .tools_for_user(&user.claims, &self.deps.policy, Some(scope))
            .await
        {
            Ok(tools) => tools,
            Err(e) => {
                return MCPResponse::error_response(
                    error_codes::INTERNAL_ERROR,
                    format!("failed to list tools: {e}"),
                    id,
                )
            }
        };

        let summaries = tools
            .iter()
            .filter(|t| !META_TOOLS.contains(&t.name.as_str()))
            .map(ToolSummary::from_tool)
            .collect();

        MCPResponse::success(
            serde_json::to_value(ToolsListResult { tools: summaries }).expect("ToolsListResult always serializes"),
            id,
        )
    }

    async fn handle_tools_call(
        &self,
        scope: &str,
        user: &AuthenticatedUser,
        endpoint_path: &str,
        id: Option<Value>,
        params: Option<Value>,
    ) -> Result<Option<MCPResponse>, GatewayError> {
        let params: MCPToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return Ok(Some(MCPResponse::error_response(
                    error_codes::INVALID_PARAMS,
                    "tools/call requires params",
                    id,
                )))
            }
            Err(e) => {
                return Ok(Some(MCPResponse::error_response(
                    error_codes::INVALID_PARAMS,
                    format!("invalid tools/call params: {e}"),
                    id,
                )))
            }
        };

        if META_TOOLS.contains(&params.name.as_str()) {
            log_denied_with_status(
                self.deps.audit_sink.as_ref(),
                user.user_id(),
                &params.name,
                endpoint_path,
                AuditStatus::Error,
                "META_TOOL_REMOVED",
            )
            .await;
            return Ok(Some(MCPResponse::error_response(
                error_codes::META_TOOL_REMOVED,
                "meta-tool removed in v2",
                id,
            )));
        }

        let rate_result = self.deps.rate_limiter.check(
            user.user_id(),
            Some(&params.name),
            self.deps.user_rate_limit,
            self.deps.tool_rate_limit,
            Instant::now(),
        );
        if !rate_result.allowed {
            log_denied_with_status(
                self.deps.audit_sink.as_ref(),
                user.user_id(),
                &params.name,
                endpoint_path,
                AuditStatus::RateLimited,
                "RATE_LIMITED",
            )
            .await;
            return Err(GatewayError::RateLimited {
                retry_after: rate_result.retry_after,
            });
        }

        let tool = match self.deps.registry.find_by_name(&params.name).await {
            Ok(Some(tool)) => tool,
            Ok(None) => {
                log_denied_with_status(
                    self.deps.audit_sink.as_ref(),
                    user.user_id(),
                    &params.name,
                    endpoint_path,
                    AuditStatus::Error,
                    "TOOL_NOT_FOUND",
                )
                .await;
                return Ok(Some(MCPResponse::error_response(
                    error_codes::TOOL_NOT_FOUND,
                    format!("tool {:?} not found", params.name),
                    id,
                )));
            }
            Err(e) => {
                return Ok(Some(MCPResponse::error_response(
                    error_codes::INTERNAL_ERROR,
                    format!("registry lookup failed: {e}"),
                    id,
                )))
            }
        };

        if tool.scope() != scope {
            log_denied_with_status(
                self.deps.audit_sink.as_ref(),
                user.user_id(),
                &params.name,
                endpoint_path,
                AuditStatus::Error,
                "TOOL_NOT_IN_SCOPE",
            )
            .await;
            return Ok(Some(MCPResponse::error_response(
                error_codes::TOOL_NOT_IN_SCOPE,
                format!("tool {:?} does not belong to scope {scope:?}", params.name),
                id,
            )));
        }

        let request_id = Uuid::new_v4();
        match self
            .deps
            .gateway
            .invoke_tool(&user.claims, endpoint_path, &params.name, params.arguments, request_id)
            .await
        {
            Ok(result) => Ok(Some(MCPResponse::success(result, id))),
            Err(GatewayError::Policy(_)) => Ok(Some(MCPResponse::error_response(
                error_codes::PERMISSION_DENIED,
                format!("tool {:?} is not allowed for this user", params.name),
                id,
            ))),
            Err(GatewayError::ToolNotFound(name)) => Ok(Some(MCPResponse::error_response(
                error_codes::TOOL_NOT_FOUND,
                format!("tool {name:?} not found"),
                id,
            ))),
            Err(GatewayError::PayloadTooLarge { size_bytes, max_bytes }) => Ok(Some(MCPResponse::error_response(
                error_codes::PAYLOAD_TOO_LARGE,
                format!("payload of {size_bytes} bytes exceeds limit of {max_bytes}"),
                id,
            ))),
            Err(GatewayError::Proxy(crate::proxy::ProxyError::Timeout { .. })) => Ok(Some(MCPResponse::error_response(
                error_codes::BACKEND_TIMEOUT,
                "backend did not respond in time",
                id,
            ))),
            Err(GatewayError::Proxy(crate::proxy::ProxyError::Unavailable { .. })) => Ok(Some(MCPResponse::error_response(
                error_codes::BACKEND_UNAVAILABLE,
                "backend is unavailable",
                id,
            ))),
            Err(e) => Ok(Some(MCPResponse::error_response(
                error_codes::INTERNAL_ERROR,
                e.to_string(),
                id,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEntry;
    use crate::domain::{PolicyConfig, RiskLevel, RoleConfig, Scope, Tool, UserClaims};
    use crate::proxy::BackendProxy;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FakeRepository {
        tools: Mutex<Vec<Tool>>,
    }

    #[async_trait]
    impl crate::registry::service::ToolRepository for FakeRepository {
        async fn all_active(&self) -> Result<Vec<Tool>, sqlx::Error> {
            Ok(self.tools.lock().iter().filter(|t| t.is_active).cloned().collect())
        }
        async fn find_by_name(&self, name: &str) -> Result<Option<Tool>, sqlx::Error> {
            Ok(self.tools.lock().iter().find(|t| t.name == name).cloned())
        }
        async fn upsert_from_catalog(&self, _entry: &crate::domain::CatalogEntry) -> Result<(), sqlx::Error> {
            Ok(())
        }
        async fn deactivate_not_in(&self, _active_names: &[String]) -> Result<(), sqlx::Error> {
            Ok(())
        }
        async fn increment_usage(&self, name: &str) -> Result<(), sqlx::Error> {
            if let Some(tool) = self.tools.lock().iter_mut().find(|t| t.name == name) {
                tool.usage_count += 1;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn record(&self, entry: AuditEntry) {
            self.entries.lock().push(entry);
        }
    }

    fn tool(name: &str, scope: &str, backend_url: &str) -> Tool {
        Tool {
            id: 1,
            name: name.to_string(),
            description: "d".to_string(),
            backend_url: backend_url.to_string(),
            scope: Scope(scope.to_string()),
            risk_level: RiskLevel::Low,
            required_roles: None,
            categories: vec!["core".to_string()],
            input_schema: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            embedding: None,
        }
    }

    fn user(roles: &[&str]) -> AuthenticatedUser {
        let claims = UserClaims {
            user_id: "u1".to_string(),
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            groups: Default::default(),
            workspace: None,
            extra: HashMap::new(),
        };
        AuthenticatedUser {
            allowed_tools: [crate::domain::WILDCARD.to_string()].into_iter().collect(),
            claims,
        }
    }

    fn wildcard_policy() -> Arc<PolicyEngine> {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![crate::domain::WILDCARD.to_string()],
            },
        );
        Arc::new(PolicyEngine::new(config))
    }

    fn build_dispatcher(tools: Vec<Tool>, backend_url: &str) -> (Dispatcher, Arc<RecordingSink>) {
        let repo = Arc::new(FakeRepository { tools: Mutex::new(tools) });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let policy = wildcard_policy();
        let sink = Arc::new(RecordingSink::default());
        let proxy = Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5)));
        let gateway = Arc::new(GatewayService::new(
            registry.clone(),
            policy.clone(),
            proxy,
            sink.clone() as Arc<dyn AuditSink>,
            1024 * 1024,
        ));
        let _ = backend_url;
        let dispatcher = Dispatcher::new(DispatcherDeps {
            registry,
            policy,
            rate_limiter: Arc::new(RateLimiter::new()),
            gateway,
            audit_sink: sink.clone() as Arc<dyn AuditSink>,
            user_rate_limit: RateLimitConfig {
                requests_per_minute: 1000,
                burst_size: 2000,
            },
            tool_rate_limit: RateLimitConfig {
                requests_per_minute: 100,
                burst_size: 200,
            },
            server_name: "tool-gateway".to_string(),
            server_version: "0.15.0-pre-alpha".to_string(),
        });
        (dispatcher, sink)
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version_and_no_list_changed() {
        let (dispatcher, _sink) = build_dispatcher(vec![], "http://unused.invalid");
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "initialize".to_string(),
                    params: None,
                    id: Some(Value::from(1)),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.result.unwrap()["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn notification_yields_no_response() {
        let (dispatcher, _sink) = build_dispatcher(vec![], "http://unused.invalid");
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "notifications/initialized".to_string(),
                    params: None,
                    id: None,
                },
            )
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn meta_tools_are_never_listed() {
        let (dispatcher, _sink) = build_dispatcher(
            vec![tool("exact_calculate", "calculator", "http://unused.invalid")],
            "http://unused.invalid",
        );
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "tools/list".to_string(),
                    params: None,
                    id: Some(Value::from(1)),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "exact_calculate");
    }

    #[tokio::test]
    async fn meta_tool_call_is_rejected_with_v2_removed_code() {
        let (dispatcher, sink) = build_dispatcher(vec![], "http://unused.invalid");
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "tools/call".to_string(),
                    params: Some(serde_json::json!({"name": "find_tools", "arguments": {}})),
                    id: Some(Value::from(1)),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::META_TOOL_REMOVED);
        assert!(error.message.contains("removed in v2"));
        assert_eq!(sink.entries.lock().len(), 1);
    }

    #[tokio::test]
    async fn out_of_scope_tool_call_is_denied_and_audited() {
        let (dispatcher, sink) = build_dispatcher(
            vec![tool("document_generate", "docs", "http://unused.invalid")],
            "http://unused.invalid",
        );
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "tools/call".to_string(),
                    params: Some(serde_json::json!({"name": "document_generate", "arguments": {}})),
                    id: Some(Value::from("c1")),
                },
            )
            .await
            .unwrap()
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, error_codes::TOOL_NOT_IN_SCOPE);
        let entries = sink.entries.lock();
        assert_eq!(entries[0].error_code.as_deref(), Some("TOOL_NOT_IN_SCOPE"));
        assert_eq!(entries[0].status, AuditStatus::Error);
    }

    #[tokio::test]
    async fn scoped_success_invokes_backend_and_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "result": {"value": 3},
                "id": "1"
            })))
            .mount(&server)
            .await;

        let (dispatcher, sink) = build_dispatcher(
            vec![tool("exact_calculate", "calculator", &server.uri())],
            &server.uri(),
        );
        let response = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "tools/call".to_string(),
                    params: Some(serde_json::json!({
                        "name": "exact_calculate",
                        "arguments": {"operator": "add", "operands": ["1", "2"]}
                    })),
                    id: Some(Value::from("c1")),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["value"], 3);
        assert_eq!(sink.entries.lock().len(), 1);
        assert_eq!(sink.entries.lock()[0].status, AuditStatus::Success);
    }

    #[tokio::test]
    async fn rate_limited_call_propagates_as_error_not_envelope() {
        let (dispatcher, sink) = build_dispatcher(
            vec![tool("exact_calculate", "calculator", "http://unused.invalid")],
            "http://unused.invalid",
        );
        // Drain the tool bucket down to nothing by hammering the limiter directly.
        for _ in 0..300 {
            dispatcher.deps.rate_limiter.check(
                "u1",
                Some("exact_calculate"),
                dispatcher.deps.user_rate_limit,
                RateLimitConfig {
                    requests_per_minute: 100,
                    burst_size: 1,
                },
                Instant::now(),
            );
        }
        let err = dispatcher
            .handle(
                "calculator",
                &user(&["admin"]),
                "/calculator/sse",
                MCPRequest {
                    jsonrpc: "2.0".to_string(),
                    method: "tools/call".to_string(),
                    params: Some(serde_json::json!({"name": "exact_calculate", "arguments": {}})),
                    id: Some(Value::from("c1")),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RateLimited { .. }));
        assert_eq!(sink.entries.lock().last().unwrap().error_code.as_deref(), Some("RATE_LIMITED"));
    }
}
