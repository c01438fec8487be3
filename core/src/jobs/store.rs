// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `JobRepository` — the persistence seam for [`crate::domain::Job`].
//! Implemented by `infrastructure::repositories::jobs::PgJobRepository`;
//! kept as a trait so [`super::runner::JobRunner`] can be unit-tested
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::Job;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error(transparent)]
    Repository(#[from] sqlx::Error),
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), JobStoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, JobStoreError>;
    async fn set_running(&self, id: Uuid) -> Result<(), JobStoreError>;
    async fn complete(&self, id: Uuid, result: Value) -> Result<(), JobStoreError>;
    async fn fail(&self, id: Uuid, error: String) -> Result<(), JobStoreError>;
    /// Backs `DELETE /mcp/jobs?hours=N`: reaps jobs older than `cutoff`,
    /// returning the number of rows removed.
    async fn reap_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, JobStoreError>;
}
