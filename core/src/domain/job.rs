// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `Job`. One-way transitions: PENDING → RUNNING →
//! {COMPLETED, FAILED}; no reverse edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Ownership rule: only the owner or an admin may read a job.
    pub fn readable_by(&self, user_id: &str, is_admin: bool) -> bool {
        is_admin || self.user_id == user_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobCreate {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    pub request_id: Option<String>,
}
