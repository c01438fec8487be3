// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `AppState` — the one shared, `Arc`-wrapped handle every axum handler
//! extracts via `State`. Constructed once at startup by the
//! `tool-gateway` binary's `main.rs`.

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::gateway::GatewayService;
use crate::infrastructure::repositories::PgAuditSink;
use crate::jobs::JobRunner;
use crate::mcp::Dispatcher;
use crate::policy::PolicyEngine;
use crate::ratelimit::{RateLimitConfig, RateLimiter};
use crate::registry::ToolRegistry;

pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub policy: Arc<PolicyEngine>,
    pub registry: Arc<ToolRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub user_rate_limit: RateLimitConfig,
    pub tool_rate_limit: RateLimitConfig,
    pub gateway: Arc<GatewayService>,
    pub dispatcher: Arc<Dispatcher>,
    pub job_runner: Arc<JobRunner>,
    /// Used to record every audit row (JSON-RPC and job paths alike).
    pub audit_sink: Arc<dyn AuditSink>,
    /// The same sink's concrete type, kept around only for
    /// `GET /admin/audit-logs`'s filtered/paginated read path — a
    /// capability `AuditSink` itself deliberately does not expose, since
    /// nothing else in the crate ever needs to read audit rows back.
    pub audit_query: Arc<PgAuditSink>,
}
