// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `AuditLog`. Append-only; never mutated after insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Error,
    Timeout,
    RateLimited,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
            AuditStatus::Timeout => "timeout",
            AuditStatus::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub user_id: String,
    pub tool_name: String,
    pub endpoint_path: String,
    pub status: AuditStatus,
    pub duration_ms: i64,
    pub error_code: Option<String>,
}

/// Query parameters for `GET /admin/audit-logs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    pub user_id: Option<String>,
    pub tool_name: Option<String>,
    pub endpoint_path: Option<String>,
    pub status: Option<AuditStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditLogQuery {
    pub fn limit_clamped(&self) -> i64 {
        self.limit.unwrap_or(100).clamp(1, 1000) as i64
    }

    pub fn offset_clamped(&self) -> i64 {
        self.offset.unwrap_or(0) as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLogPage {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
