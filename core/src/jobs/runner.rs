// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `JobRunner`: submits and background-executes async tool invocations.
//! Grounded on `examples/original_source/src/jobs/service.py`'s
//! `submit_job` and `process_job_task`.
//!
//! The original's background task opens a fresh DB session and HTTP
//! client because its request-scoped ones are tied to the (already
//! responded) originating request. In this workspace the database pool
//! and [`crate::proxy::BackendProxy`]'s HTTP client are already
//! connection-pooled, process-wide, `Send + Sync` handles — a spawned
//! task borrows the same pool rather than opening a new one, which is
//! the idiomatic equivalent of "fresh" here: the task never inherits a
//! request-scoped guard that could be dropped out from under it.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::domain::{AuthenticatedUser, Job, JobCreate, JobStatus};
use crate::gateway::GatewayService;

use super::store::{JobRepository, JobStoreError};

/// Endpoint path recorded on the audit row for every job-driven
/// invocation — jobs are only ever submitted through this one route.
pub const JOBS_ENDPOINT_PATH: &str = "/mcp/jobs";

pub struct JobRunner {
    repository: Arc<dyn JobRepository>,
    gateway: Arc<GatewayService>,
}

impl JobRunner {
    pub fn new(repository: Arc<dyn JobRepository>, gateway: Arc<GatewayService>) -> Self {
        JobRunner { repository, gateway }
    }

    /// Creates a PENDING job row and schedules its background execution.
    /// Returns the persisted job immediately so the caller can respond
    /// `202` without waiting on the backend call.
    pub async fn submit(
        self: &Arc<Self>,
        user: &AuthenticatedUser,
        create: JobCreate,
    ) -> Result<Job, JobStoreError> {
        let job = Job {
            id: Uuid::new_v4(),
            user_id: user.user_id().to_string(),
            tool_name: create.tool_name,
            arguments: create.arguments,
            status: JobStatus::Pending,
            result: None,
            error: None,
            request_id: create.request_id,
            created_at: chrono::Utc::now(),
            completed_at: None,
        };
        self.repository.create(&job).await?;

        let runner = Arc::clone(self);
        let claims = user.claims.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            runner.execute(job_id, claims).await;
        });

        Ok(job)
    }

    async fn execute(&self, job_id: Uuid, claims: crate::domain::UserClaims) {
        let Some(job) = self.load(job_id).await else {
            return;
        };

        if let Err(e) = self.repository.set_running(job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "failed to mark job running");
            return;
        }

        let request_id = job
            .request_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap_or(job_id);

        let outcome = self
            .gateway
            .invoke_tool(&claims, JOBS_ENDPOINT_PATH, &job.tool_name, job.arguments.clone(), request_id)
            .await;

        let finish = match outcome {
            Ok(result) => self.repository.complete(job_id, result).await,
            Err(e) => self.repository.fail(job_id, e.to_string()).await,
        };

        if let Err(e) = finish {
            tracing::error!(job_id = %job_id, error = %e, "failed to persist job outcome; dropping");
        }
    }

    async fn load(&self, job_id: Uuid) -> Option<Job> {
        match self.repository.find_by_id(job_id).await {
            Ok(Some(job)) => Some(job),
            Ok(None) => {
                tracing::error!(job_id = %job_id, "job vanished before background execution started");
                None
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "failed to reload job for execution");
                None
            }
        }
    }

    /// Backs `DELETE /mcp/jobs?hours=N`, admin-only.
    pub async fn reap(&self, hours: i64) -> Result<u64, JobStoreError> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(hours);
        self.repository.reap_older_than(cutoff).await
    }

    /// Backs `GET /mcp/jobs/{id}`: ownership is checked by the caller via
    /// [`Job::readable_by`].
    pub async fn find(&self, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        self.repository.find_by_id(id).await
    }
}
