// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `PgAuditSink`, backed by the `audit_logs` table (single-column
//! indexes on `timestamp`, `user_id`, `tool_name`, `status`,
//! `endpoint_path`, `request_id`). Append-only: rows are never updated
//! or deleted by this repository.

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::audit::{AuditEntry, AuditSink};
use crate::domain::{AuditLog, AuditLogPage, AuditLogQuery, AuditStatus};

pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        PgAuditSink { pool }
    }

    /// Backs `GET /admin/audit-logs`: filtered, paginated,
    /// ordered by `timestamp` desc.
    pub async fn query(&self, query: &AuditLogQuery) -> Result<AuditLogPage, sqlx::Error> {
        let limit = query.limit_clamped();
        let offset = query.offset_clamped();
        let status_str = query.status.map(status_str);

        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, request_id, user_id, tool_name, endpoint_path,
                   status, duration_ms, error_code
            FROM audit_logs
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR tool_name = $2)
              AND ($3::text IS NULL OR endpoint_path = $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR timestamp >= $5)
              AND ($6::timestamptz IS NULL OR timestamp <= $6)
            ORDER BY timestamp DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(&query.user_id)
        .bind(&query.tool_name)
        .bind(&query.endpoint_path)
        .bind(&status_str)
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query(
            r#"
            SELECT count(*) AS total
            FROM audit_logs
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR tool_name = $2)
              AND ($3::text IS NULL OR endpoint_path = $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR timestamp >= $5)
              AND ($6::timestamptz IS NULL OR timestamp <= $6)
            "#,
        )
        .bind(&query.user_id)
        .bind(&query.tool_name)
        .bind(&query.endpoint_path)
        .bind(&status_str)
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await?
        .get("total");

        let items = rows.into_iter().map(row_to_audit_log).collect();
        Ok(AuditLogPage { items, total, limit, offset })
    }
}

fn status_str(status: AuditStatus) -> &'static str {
    status.as_str()
}

fn row_to_audit_log(row: sqlx::postgres::PgRow) -> AuditLog {
    let status_raw: String = row.get("status");
    let status = match status_raw.as_str() {
        "error" => AuditStatus::Error,
        "timeout" => AuditStatus::Timeout,
        "rate_limited" => AuditStatus::RateLimited,
        _ => AuditStatus::Success,
    };
    AuditLog {
        id: row.get("id"),
        timestamp: row.get("timestamp"),
        request_id: row.get("request_id"),
        user_id: row.get("user_id"),
        tool_name: row.get("tool_name"),
        endpoint_path: row.get("endpoint_path"),
        status,
        duration_ms: row.get("duration_ms"),
        error_code: row.get("error_code"),
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, entry: AuditEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                request_id, user_id, tool_name, endpoint_path, status, duration_ms, error_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.request_id)
        .bind(&entry.user_id)
        .bind(&entry.tool_name)
        .bind(&entry.endpoint_path)
        .bind(status_str(entry.status))
        .bind(entry.duration_ms)
        .bind(&entry.error_code)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::error!(request_id = %entry.request_id, error = %e, "failed to persist audit log row");
        }
    }
}
