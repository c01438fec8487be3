// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `GET /{scope}/sse` and `POST /{scope}/sse`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream};

use crate::domain::AuthenticatedUser;
use crate::mcp::{error_codes, MCPRequest, MCPResponse};

use super::state::AppState;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

fn invalid_scope_response() -> Response {
    let body = MCPResponse::error_response(error_codes::INVALID_SCOPE, "Invalid endpoint scope", None);
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn validate_scope(scope: &str) -> Result<(), Response> {
    if crate::config::SCOPES.contains(&scope) {
        Ok(())
    } else {
        Err(invalid_scope_response())
    }
}

/// Opens an SSE stream announcing the POST endpoint, then a comment ping
/// every 30s until the client disconnects. The endpoint-announcement
/// frame carries an absolute URL so clients that only ever see this
/// stream can still reach the message channel.
pub async fn sse_handler(
    State(_state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    _user: AuthenticatedUser,
) -> Response {
    if let Err(response) = validate_scope(&scope) {
        return response;
    }

    let endpoint_event = Event::default()
        .event("endpoint")
        .data(format!("/{scope}/sse"));

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(stream::once(async move { Ok(endpoint_event) }));

    // The 30s ping is the library's own keep-alive comment frame, not a
    // second hand-rolled timer — one source of periodic output, not two.
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEPALIVE_INTERVAL))
        .into_response()
}

/// The JSON-RPC message channel. HTTP status follows a fixed table keyed
/// off the envelope's error code: most JSON-RPC errors ride inside a
/// 200 envelope, but a handful (tool not found, not allowed, backend
/// failures, payload too large) carry their own HTTP status even though
/// the body is still a JSON-RPC envelope. A notification yields 204 with
/// no body; a rate-limit denial is the one case the dispatcher surfaces
/// as an `Err`, mapped by [`GatewayError`]'s own `IntoResponse` to 429 +
/// `Retry-After`.
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    user: AuthenticatedUser,
    Json(request): Json<MCPRequest>,
) -> Response {
    if let Err(response) = validate_scope(&scope) {
        return response;
    }

    let endpoint_path = format!("/{scope}/sse");
    match state.dispatcher.handle(&scope, &user, &endpoint_path, request).await {
        Ok(Some(response)) => {
            let status = status_for_envelope(&response);
            (status, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// The "HTTP (when non-200)" mapping, keyed off the JSON-RPC error code
/// riding in the envelope body.
fn status_for_envelope(response: &MCPResponse) -> StatusCode {
    match response.error.as_ref().map(|e| e.code) {
        Some(error_codes::TOOL_NOT_FOUND) => StatusCode::NOT_FOUND,
        Some(error_codes::PERMISSION_DENIED) => StatusCode::FORBIDDEN,
        Some(error_codes::BACKEND_TIMEOUT) => StatusCode::GATEWAY_TIMEOUT,
        Some(error_codes::BACKEND_UNAVAILABLE) => StatusCode::BAD_GATEWAY,
        Some(error_codes::PAYLOAD_TOO_LARGE) => StatusCode::PAYLOAD_TOO_LARGE,
        Some(error_codes::INVALID_SCOPE) => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    }
}
