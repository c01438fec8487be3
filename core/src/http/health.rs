// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `GET /health`. Never requires auth.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "app": state.settings.app_name.clone() }))
}
