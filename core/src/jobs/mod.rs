// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Async Job Runner: background execution of submitted tool invocations.

pub mod runner;
pub mod store;

pub use runner::JobRunner;
pub use store::{JobRepository, JobStoreError};
