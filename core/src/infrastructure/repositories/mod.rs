// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL implementations of the three persistence seams declared
//! elsewhere in the crate: [`crate::registry::service::ToolRepository`],
//! [`crate::audit::AuditSink`], and [`crate::jobs::JobRepository`].
//!
//! Each submodule owns one table.

pub mod audit_logs;
pub mod jobs;
pub mod tools;

pub use audit_logs::PgAuditSink;
pub use jobs::PgJobRepository;
pub use tools::PgToolRepository;
