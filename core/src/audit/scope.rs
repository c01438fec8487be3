// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `AuditScope` — a guard type that couples start+defer in one statement
//! so callers cannot accidentally skip persistence. Grounded on
//! `examples/original_source/src/audit/logger.py`'s `AuditContext` class
//! and its `audit_tool_invocation` async context manager.
//!
//! Rust's `Drop` cannot run async code, so this cannot be a literal
//! `__aexit__` port: a dropped-without-finishing scope would need to
//! perform an async database write from a synchronous destructor. Instead
//! every caller is required to call [`AuditScope::finish`] (or one of the
//! `mark_*` helpers followed by `finish`) at its natural exit point — the
//! end of [`crate::gateway`]'s invocation orchestration, in every branch.
//! `Drop` is kept only as a debug-assertion backstop that catches a
//! missed `finish()` call in development and test builds; it never
//! attempts to persist anything itself.

use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::AuditStatus;

/// One row's worth of data, handed to an [`AuditSink`] at `finish` time.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub request_id: Uuid,
    pub user_id: String,
    pub tool_name: String,
    pub endpoint_path: String,
    pub status: AuditStatus,
    pub duration_ms: i64,
    pub error_code: Option<String>,
}

/// Persistence seam implemented by `infrastructure::repositories::audit_logs`.
/// Kept as a trait so unit tests can assert on recorded entries without a
/// database.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Starts timing and status tracking for one tool invocation. Must be
/// closed with [`AuditScope::finish`] exactly once.
pub struct AuditScope {
    request_id: Uuid,
    user_id: String,
    tool_name: String,
    endpoint_path: String,
    start: Instant,
    status: AuditStatus,
    error_code: Option<String>,
    finished: bool,
}

impl AuditScope {
    pub fn start(request_id: Uuid, user_id: impl Into<String>, tool_name: impl Into<String>, endpoint_path: impl Into<String>) -> Self {
        AuditScope {
            request_id,
            user_id: user_id.into(),
            tool_name: tool_name.into(),
            endpoint_path: endpoint_path.into(),
            start: Instant::now(),
            status: AuditStatus::Success,
            error_code: None,
            finished: false,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn duration_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }

    pub fn mark_error(&mut self, error_code: impl Into<String>) {
        self.status = AuditStatus::Error;
        self.error_code = Some(error_code.into());
    }

    pub fn mark_timeout(&mut self) {
        self.status = AuditStatus::Timeout;
        self.error_code = Some("BACKEND_TIMEOUT".to_string());
    }

    pub fn mark_rate_limited(&mut self) {
        self.status = AuditStatus::RateLimited;
        self.error_code = Some("RATE_LIMITED".to_string());
    }

    /// Persist the accumulated entry via `sink` and consume the scope.
    /// Always call this, on every code path, before the scope would
    /// otherwise go out of scope — including error paths.
    pub async fn finish(mut self, sink: &dyn AuditSink) {
        let entry = AuditEntry {
            request_id: self.request_id,
            user_id: std::mem::take(&mut self.user_id),
            tool_name: std::mem::take(&mut self.tool_name),
            endpoint_path: std::mem::take(&mut self.endpoint_path),
            status: self.status,
            duration_ms: self.duration_ms(),
            error_code: self.error_code.take(),
        };
        log_entry(&entry);
        sink.record(entry).await;
        self.finished = true;
    }
}

/// Emitted alongside every persisted row, success or not, as a
/// structured log line carrying the same fields. Logging happens
/// whether or not the sink's own write succeeds, since the sink already
/// swallows its own persistence errors rather than propagating them.
fn log_entry(entry: &AuditEntry) {
    tracing::info!(
        request_id = %entry.request_id,
        user_id = %entry.user_id,
        tool_name = %entry.tool_name,
        endpoint_path = %entry.endpoint_path,
        status = entry.status.as_str(),
        duration_ms = entry.duration_ms,
        error_code = entry.error_code.as_deref().unwrap_or(""),
        "tool invocation audited"
    );
}

impl Drop for AuditScope {
    fn drop(&mut self) {
        debug_assert!(
            self.finished,
            "AuditScope for request {} dropped without finish() being called",
            self.request_id
        );
    }
}

/// Standalone helper for denial paths that never construct a full
/// [`AuditScope`] — e.g. a request rejected before a request id is even
/// worth minting for in-flight tracking. Mirrors the original's
/// `log_denied_tool_invocation` (fresh id, zero duration, error row).
pub async fn log_denied(
    sink: &dyn AuditSink,
    user_id: impl Into<String>,
    tool_name: impl Into<String>,
    endpoint_path: impl Into<String>,
    error_code: impl Into<String>,
) -> Uuid {
    log_denied_with_status(sink, user_id, tool_name, endpoint_path, AuditStatus::Error, error_code).await
}

/// As [`log_denied`], but with an explicit status — used by the MCP
/// dispatcher when a rate-limit probe trips before the gateway service
/// is ever called, so the row reads `status=rate_limited` rather than a
/// generic `error`.
pub async fn log_denied_with_status(
    sink: &dyn AuditSink,
    user_id: impl Into<String>,
    tool_name: impl Into<String>,
    endpoint_path: impl Into<String>,
    status: AuditStatus,
    error_code: impl Into<String>,
) -> Uuid {
    let request_id = Uuid::new_v4();
    let entry = AuditEntry {
        request_id,
        user_id: user_id.into(),
        tool_name: tool_name.into(),
        endpoint_path: endpoint_path.into(),
        status,
        duration_ms: 0,
        error_code: Some(error_code.into()),
    };
    log_entry(&entry);
    sink.record(entry).await;
    request_id
}
