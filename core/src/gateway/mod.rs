// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gateway Service: orchestrates one tool invocation end to end.
//! Grounded on `examples/original_source/src/gateway/service.py`'s
//! `invoke_tool`, including its exception→audit-status mapping.
//!
//! Rate limiting is deliberately *not* one of this service's steps: the
//! order here runs payload-size → permission → registry lookup →
//! per-tool role gate → forward, with no rate-limit entry, while the
//! MCP dispatcher consults the rate limiter itself before ever calling
//! into this service (and logs a denial directly via
//! [`crate::audit::log_denied`] when it trips). That keeps this service
//! usable from both the synchronous dispatch path and the async job
//! runner without re-deriving a request's rate-limit identity.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::audit::{AuditScope, AuditSink};
use crate::domain::{ToolLike, UserClaims};
use crate::error::GatewayError;
use crate::policy::PolicyEngine;
use crate::proxy::{BackendProxy, ProxyError};
use crate::registry::ToolRegistry;

pub struct GatewayService {
    registry: Arc<ToolRegistry>,
    policy: Arc<PolicyEngine>,
    proxy: Arc<BackendProxy>,
    audit_sink: Arc<dyn AuditSink>,
    max_payload_bytes: usize,
}

impl GatewayService {
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<PolicyEngine>,
        proxy: Arc<BackendProxy>,
        audit_sink: Arc<dyn AuditSink>,
        max_payload_bytes: usize,
    ) -> Self {
        GatewayService {
            registry,
            policy,
            proxy,
            audit_sink,
            max_payload_bytes,
        }
    }

    fn validate_payload_size(&self, arguments: &Value) -> Result<(), GatewayError> {
        let size_bytes = serde_json::to_vec(arguments).map(|b| b.len()).unwrap_or(0);
        if size_bytes > self.max_payload_bytes {
            return Err(GatewayError::PayloadTooLarge {
                size_bytes,
                max_bytes: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Executes one invocation inside a single [`AuditScope`], guaranteed
    /// to `finish()` on every return path. Step order: payload size,
    /// name-level permission, registry lookup, per-tool role gate,
    /// backend forward.
    pub async fn invoke_tool(
        &self,
        claims: &UserClaims,
        endpoint_path: &str,
        tool_name: &str,
        arguments: Value,
        request_id: Uuid,
    ) -> Result<Value, GatewayError> {
        let mut scope = AuditScope::start(request_id, claims.user_id.clone(), tool_name, endpoint_path);

        let result = self.invoke_inner(claims, tool_name, arguments, request_id, &mut scope).await;

        match &result {
            Ok(_) => {}
            Err(GatewayError::PayloadTooLarge { .. }) => scope.mark_error("PAYLOAD_TOO_LARGE"),
            Err(GatewayError::RateLimited { .. }) => scope.mark_rate_limited(),
            Err(GatewayError::Policy(_)) => scope.mark_error("TOOL_NOT_ALLOWED"),
            Err(GatewayError::ToolNotFound(_)) => scope.mark_error("TOOL_NOT_FOUND"),
            Err(GatewayError::Proxy(ProxyError::Timeout { .. })) => scope.mark_timeout(),
            Err(GatewayError::Proxy(ProxyError::Unavailable { .. })) => scope.mark_error("BACKEND_UNAVAILABLE"),
            Err(GatewayError::Proxy(ProxyError::BackendStatus { .. })) => scope.mark_error("BACKEND_ERROR"),
            Err(GatewayError::Proxy(ProxyError::SecretNotConfigured)) => scope.mark_error("BACKEND_ERROR"),
            Err(_) => scope.mark_error("INTERNAL_ERROR"),
        }
        scope.finish(self.audit_sink.as_ref()).await;
        result
    }

    async fn invoke_inner(
        &self,
        claims: &UserClaims,
        tool_name: &str,
        arguments: Value,
        request_id: Uuid,
        _scope: &mut AuditScope,
    ) -> Result<Value, GatewayError> {
        self.validate_payload_size(&arguments)?;

        let all_tools = self.registry.all_active_tools().await.map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!("registry lookup failed: {e}"))
        })?;
        let all_names: std::collections::HashSet<String> =
            all_tools.iter().map(|t| t.name.clone()).collect();
        if !self.policy.is_tool_name_allowed(claims, tool_name, &all_names) {
            return Err(GatewayError::Policy(crate::policy::PolicyError::NotAllowed(
                tool_name.to_string(),
            )));
        }

        let tool = self
            .registry
            .find_by_name(tool_name)
            .await
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!("registry lookup failed: {e}")))?
            .ok_or_else(|| GatewayError::ToolNotFound(tool_name.to_string()))?;

        if !tool.role_gate_passes(&claims.roles)
            || !self.policy.policy_tool_role_gate_passes(tool_name, &claims.roles)
        {
            return Err(GatewayError::Policy(crate::policy::PolicyError::NotAllowed(
                tool_name.to_string(),
            )));
        }

        let response = self
            .proxy
            .forward_tool_call(&tool.backend_url, tool_name, arguments, request_id, Some(&claims.user_id))
            .await?;

        if let Some(error) = response.error {
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "backend returned JSON-RPC error {}: {}",
                error.code,
                error.message
            )));
        }

        let _ = self.registry.increment_usage(tool_name).await;

        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEntry;
    use crate::domain::{PolicyConfig, RiskLevel, RoleConfig, Scope, Tool};
    use crate::registry::ToolRegistry;
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

    fn claims(roles: &[&str]) -> UserClaims {
        UserClaims {
            user_id: "u1".to_string(),
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            groups: Default::default(),
            workspace: None,
            extra: HashMap::new(),
        }
    }

    fn tool(name: &str, scope: &str, backend_url: &str, required_roles: Option<Vec<String>>) -> Tool {
        Tool {
            id: 1,
            name: name.to_string(),
            description: "d".to_string(),
            backend_url: backend_url.to_string(),
            scope: Scope(scope.to_string()),
            risk_level: RiskLevel::Low,
            required_roles,
            categories: vec![],
            input_schema: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            embedding: None,
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

    #[tokio::test]
    async fn successful_invocation_increments_usage_and_audits_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "jsonrpc": "2.0",
                "result": {"ok": true},
                "id": "1"
            })))
            .mount(&server)
            .await;

        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", &server.uri(), None)]),
        });
        let registry = Arc::new(ToolRegistry::new(repo.clone(), std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());
        let service = GatewayService::new(
            registry,
            wildcard_policy(),
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5))),
            sink.clone(),
            1024 * 1024,
        );

        let result = service
            .invoke_tool(&claims(&["admin"]), "/calculator/sse", "calc.add", serde_json::json!({}), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(result["ok"], true);

        let entries = sink.entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, crate::domain::AuditStatus::Success);
        assert_eq!(repo.tools.lock()[0].usage_count, 1);
    }

    #[tokio::test]
    async fn payload_too_large_never_reaches_backend() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", "http://unused.invalid", None)]),
        });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());
        let service = GatewayService::new(
            registry,
            wildcard_policy(),
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5))),
            sink.clone(),
            4,
        );

        let big = serde_json::json!({"payload": "way too big for the limit"});
        let err = service
            .invoke_tool(&claims(&["admin"]), "/calculator/sse", "calc.add", big, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge { .. }));
        assert_eq!(sink.entries.lock()[0].error_code.as_deref(), Some("PAYLOAD_TOO_LARGE"));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_not_found() {
        let repo = Arc::new(FakeRepository { tools: Mutex::new(vec![]) });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());
        let service = GatewayService::new(
            registry,
            wildcard_policy(),
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5))),
            sink.clone(),
            1024 * 1024,
        );

        let err = service
            .invoke_tool(&claims(&["admin"]), "/calculator/sse", "ghost", serde_json::json!({}), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn missing_required_role_is_denied_even_under_wildcard() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool(
                "git.commit",
                "git",
                "http://unused.invalid",
                Some(vec!["release-manager".to_string()]),
            )]),
        });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());
        let service = GatewayService::new(
            registry,
            wildcard_policy(),
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5))),
            sink.clone(),
            1024 * 1024,
        );

        let err = service
            .invoke_tool(&claims(&["admin"]), "/git/sse", "git.commit", serde_json::json!({}), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Policy(_)));
    }

    #[tokio::test]
    async fn policy_tools_override_is_enforced_even_without_catalog_required_roles() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", "http://unused.invalid", None)]),
        });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());

        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![crate::domain::WILDCARD.to_string()],
            },
        );
        config.tools.insert(
            "calc.add".to_string(),
            crate::domain::ToolConfig {
                required_roles: vec!["release-manager".to_string()],
            },
        );
        let policy = Arc::new(PolicyEngine::new(config));

        let service = GatewayService::new(
            registry,
            policy,
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_secs(5))),
            sink.clone(),
            1024 * 1024,
        );

        let err = service
            .invoke_tool(&claims(&["admin"]), "/calculator/sse", "calc.add", serde_json::json!({}), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Policy(_)));
    }

    #[tokio::test]
    async fn backend_timeout_marks_audit_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(200)))
            .mount(&server)
            .await;

        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", &server.uri(), None)]),
        });
        let registry = Arc::new(ToolRegistry::new(repo, std::time::Duration::from_secs(300)));
        let sink = Arc::new(RecordingSink::default());
        let service = GatewayService::new(
            registry,
            wildcard_policy(),
            Arc::new(BackendProxy::new("s3cr3t", std::time::Duration::from_millis(20))),
            sink.clone(),
            1024 * 1024,
        );

        let err = service
            .invoke_tool(&claims(&["admin"]), "/calculator/sse", "calc.add", serde_json::json!({}), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Proxy(ProxyError::Timeout { .. })));
        assert_eq!(sink.entries.lock()[0].status, crate::domain::AuditStatus::Timeout);
    }
}
