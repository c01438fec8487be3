// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `GET /admin/audit-logs`. Admin-only.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::{AuditLogQuery, AuthenticatedUser};
use crate::error::GatewayError;

use super::auth_extractor::require_admin;
use super::state::AppState;

pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<AuditLogQuery>,
) -> Response {
    if let Err(response) = require_admin(&user) {
        return response;
    }
    match state.audit_query.query(&query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => GatewayError::Internal(anyhow::anyhow!("audit log query failed: {e}")).into_response(),
    }
}
