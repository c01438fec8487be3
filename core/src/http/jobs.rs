// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `POST /mcp/jobs`, `GET /mcp/jobs/{id}`, `DELETE /mcp/jobs`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{AuthenticatedUser, JobCreate};
use crate::error::GatewayError;

use super::auth_extractor::require_admin;
use super::state::AppState;

pub async fn create_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(create): Json<JobCreate>,
) -> Response {
    match state.job_runner.submit(&user, create).await {
        Ok(job) => (StatusCode::ACCEPTED, Json(job)).into_response(),
        Err(e) => GatewayError::Internal(anyhow::anyhow!("failed to create job: {e}")).into_response(),
    }
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Response {
    match state.job_runner.find(id).await {
        Ok(Some(job)) if job.readable_by(user.user_id(), user.is_admin()) => {
            (StatusCode::OK, Json(job)).into_response()
        }
        Ok(Some(_)) => GatewayError::AdminRequired.into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => GatewayError::Internal(anyhow::anyhow!("failed to load job: {e}")).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReapQuery {
    #[serde(default = "default_hours")]
    hours: i64,
}

fn default_hours() -> i64 {
    24
}

pub async fn reap_jobs(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Query(query): Query<ReapQuery>,
) -> Response {
    if let Err(response) = require_admin(&user) {
        return response;
    }
    match state.job_runner.reap(query.hours).await {
        Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        Err(e) => GatewayError::Internal(anyhow::anyhow!("failed to reap jobs: {e}")).into_response(),
    }
}
