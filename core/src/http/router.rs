// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Top-level axum router. `{scope}` matches any string;
//! [`super::mcp_routes`] rejects anything outside `config::SCOPES` with
//! the `-32010` envelope rather than relying on axum's router to
//! enumerate the three scope literals as separate routes.

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::state::AppState;
use super::{admin, health, jobs, mcp_routes, tools};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/{scope}/sse", get(mcp_routes::sse_handler).post(mcp_routes::message_handler))
        .route("/mcp/tools", get(tools::list_tools))
        .route("/mcp/jobs", post(jobs::create_job).delete(jobs::reap_jobs))
        .route("/mcp/jobs/{id}", get(jobs::get_job))
        .route("/admin/audit-logs", get(admin::list_audit_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
