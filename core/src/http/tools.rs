// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `GET /mcp/tools`: the legacy REST tool listing,
//! user-scoped but not endpoint-scoped (unlike `tools/list` over
//! `/{scope}/sse`, this lists everything the user may call regardless of
//! which scope they'd invoke it through).

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::domain::AuthenticatedUser;
use crate::error::GatewayError;
use crate::mcp::ToolSummary;

use super::state::AppState;

pub async fn list_tools(State(state): State<Arc<AppState>>, user: AuthenticatedUser) -> Response {
    match state.registry.tools_for_user(&user.claims, &state.policy, None).await {
        Ok(tools) => {
            let summaries: Vec<ToolSummary> = tools.iter().map(ToolSummary::from_tool).collect();
            Json(serde_json::json!({ "tools": summaries })).into_response()
        }
        Err(e) => GatewayError::Internal(anyhow::anyhow!("failed to list tools: {e}")).into_response(),
    }
}
