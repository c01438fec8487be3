// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Single error taxonomy for the gateway, mapped to HTTP status in one
//! table: a sum type with a `code` symbol and a message, with the global
//! handler mapping code→HTTP status in one place rather than an
//! exception-only design that relies on subclass hopping.
//!
//! Each module exposes its own small `thiserror` enum (`JwtError`,
//! `PolicyError`, `ProxyError`, ...); [`GatewayError`] is the seam where
//! those get funneled into one HTTP response shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::auth::jwt::JwtError;
use crate::policy::engine::PolicyError;
use crate::proxy::ProxyError;

/// Error-code symbol surfaced to clients. Distinct from the JSON-RPC
/// numeric codes in [`crate::mcp::schema::error_codes`] — this symbol is
/// what non-JSON-RPC routes and audit rows carry, as
/// `{error: <code-symbol>, message: <prose>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidToken,
    ExpiredToken,
    ToolNotAllowed,
    AdminRequired,
    ToolNotFound,
    RateLimitExceeded,
    PayloadTooLarge,
    BackendTimeout,
    BackendUnavailable,
    BackendError,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidToken => "InvalidTokenError",
            ErrorCode::ExpiredToken => "ExpiredTokenError",
            ErrorCode::ToolNotAllowed => "ToolNotAllowedError",
            ErrorCode::AdminRequired => "AdminRequiredError",
            ErrorCode::ToolNotFound => "ToolNotFoundError",
            ErrorCode::RateLimitExceeded => "RateLimitExceeded",
            ErrorCode::PayloadTooLarge => "PayloadTooLargeError",
            ErrorCode::BackendTimeout => "BackendTimeoutError",
            ErrorCode::BackendUnavailable => "BackendUnavailableError",
            ErrorCode::BackendError => "BackendError",
            ErrorCode::Internal => "InternalError",
        }
    }

    /// The single code→status table every error maps through.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidToken | ErrorCode::ExpiredToken => StatusCode::UNAUTHORIZED,
            ErrorCode::ToolNotAllowed | ErrorCode::AdminRequired => StatusCode::FORBIDDEN,
            ErrorCode::ToolNotFound => StatusCode::NOT_FOUND,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::BackendUnavailable | ErrorCode::BackendError => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("rate limit exceeded, retry after {retry_after:.3}s")]
    RateLimited { retry_after: f64 },
    #[error("payload too large: {size_bytes} bytes exceeds limit of {max_bytes}")]
    PayloadTooLarge { size_bytes: usize, max_bytes: usize },
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error("admin role required")]
    AdminRequired,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl GatewayError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GatewayError::Jwt(e) if e.is_expired() => ErrorCode::ExpiredToken,
            GatewayError::Jwt(_) => ErrorCode::InvalidToken,
            GatewayError::Policy(_) => ErrorCode::ToolNotAllowed,
            GatewayError::ToolNotFound(_) => ErrorCode::ToolNotFound,
            GatewayError::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            GatewayError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            GatewayError::Proxy(ProxyError::Timeout { .. }) => ErrorCode::BackendTimeout,
            GatewayError::Proxy(ProxyError::Unavailable { .. }) => ErrorCode::BackendUnavailable,
            GatewayError::Proxy(ProxyError::BackendStatus { .. })
            | GatewayError::Proxy(ProxyError::SecretNotConfigured) => ErrorCode::BackendError,
            GatewayError::AdminRequired => ErrorCode::AdminRequired,
            GatewayError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Audit-log error code field, e.g. `"TOOL_NOT_ALLOWED"` — distinct
    /// casing from [`ErrorCode::as_str`], matching the original's
    /// SCREAMING_SNAKE_CASE `error_code` column values.
    pub fn audit_code(&self) -> &'static str {
        match self {
            GatewayError::Jwt(e) if e.is_expired() => "TOKEN_EXPIRED",
            GatewayError::Jwt(_) => "INVALID_TOKEN",
            GatewayError::Policy(_) => "TOOL_NOT_ALLOWED",
            GatewayError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            GatewayError::Proxy(ProxyError::Timeout { .. }) => "BACKEND_TIMEOUT",
            GatewayError::Proxy(ProxyError::Unavailable { .. }) => "BACKEND_UNAVAILABLE",
            GatewayError::Proxy(ProxyError::BackendStatus { .. }) => "BACKEND_ERROR",
            GatewayError::Proxy(ProxyError::SecretNotConfigured) => "BACKEND_ERROR",
            GatewayError::AdminRequired => "ADMIN_REQUIRED",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let code = self.code();
        tracing::error!(error_code = code.as_str(), %self, "request failed");
        let mut response = (
            code.status(),
            Json(ErrorBody {
                error: code.as_str(),
                message: self.to_string(),
            }),
        )
            .into_response();
        if let GatewayError::RateLimited { retry_after } = self {
            let header_value = retry_after.ceil().max(1.0) as u64;
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&header_value.to_string()).unwrap(),
            );
        }
        response
    }
}
