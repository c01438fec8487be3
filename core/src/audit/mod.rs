// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Audit Recorder: per-invocation audit trail, persisted and logged.

pub mod scope;

pub use scope::{log_denied, log_denied_with_status, AuditEntry, AuditScope, AuditSink};
