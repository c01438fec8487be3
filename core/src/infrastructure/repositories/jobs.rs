// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `PgJobRepository`, backed by the `jobs` table (single-column
//! indexes on `user_id` and `request_id`, primary key `id`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{Job, JobStatus};
use crate::jobs::{JobRepository, JobStoreError};

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        PgJobRepository { pool }
    }
}

fn status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "PENDING",
        JobStatus::Running => "RUNNING",
        JobStatus::Completed => "COMPLETED",
        JobStatus::Failed => "FAILED",
    }
}

fn row_to_job(row: sqlx::postgres::PgRow) -> Job {
    let status_raw: String = row.get("status");
    let status = match status_raw.as_str() {
        "RUNNING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        _ => JobStatus::Pending,
    };
    Job {
        id: row.get("id"),
        user_id: row.get("user_id"),
        tool_name: row.get("tool_name"),
        arguments: row.get("arguments"),
        status,
        result: row.get("result"),
        error: row.get("error"),
        request_id: row.get("request_id"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, job: &Job) -> Result<(), JobStoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, user_id, tool_name, arguments, status, request_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.tool_name)
        .bind(&job.arguments)
        .bind(status_str(job.status))
        .bind(&job.request_id)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, tool_name, arguments, status, result, error,
                   request_id, created_at, completed_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_job))
    }

    async fn set_running(&self, id: Uuid) -> Result<(), JobStoreError> {
        sqlx::query("UPDATE jobs SET status = 'RUNNING' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete(&self, id: Uuid, result: Value) -> Result<(), JobStoreError> {
        sqlx::query(
            "UPDATE jobs SET status = 'COMPLETED', result = $2, completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: String) -> Result<(), JobStoreError> {
        sqlx::query(
            "UPDATE jobs SET status = 'FAILED', error = $2, completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reap_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, JobStoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
