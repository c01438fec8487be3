// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `AuthenticatedUser` as an axum extractor: reads the `Authorization:
//! Bearer <jwt>` header, validates it, and derives `allowed_tools` from
//! the policy engine against the current set of active tool names.
//! Every route but `/health` uses this extractor;
//! a missing or invalid header fails the same way an invalid token does.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};

use crate::auth::JwtError;
use crate::domain::AuthenticatedUser;
use crate::error::GatewayError;

use super::state::AppState;

pub struct AuthRejection(pub GatewayError);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, JwtError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| JwtError::Invalid("missing Authorization header".to_string()))?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| JwtError::Invalid("Authorization header is not a bearer token".to_string()))
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).map_err(|e| AuthRejection(GatewayError::Jwt(e)))?;
        let claims = state
            .jwt_validator
            .validate(token)
            .map_err(|e| AuthRejection(GatewayError::Jwt(e)))?;

        let all_tools = state.registry.all_active_tools().await.map_err(|e| {
            AuthRejection(GatewayError::Internal(anyhow::anyhow!(
                "registry lookup failed while resolving allowed tools: {e}"
            )))
        })?;
        let all_names: std::collections::HashSet<String> = all_tools.iter().map(|t| t.name.clone()).collect();
        let allowed_tools = state.policy.allowed_tool_names(&claims, &all_names);

        Ok(AuthenticatedUser { claims, allowed_tools })
    }
}

/// Enforced at the top of every admin-only handler; not an extractor
/// itself since it needs the already-extracted `AuthenticatedUser`.
pub fn require_admin(user: &AuthenticatedUser) -> Result<(), Response> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(GatewayError::AdminRequired.into_response())
    }
}
