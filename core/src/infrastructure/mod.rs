// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL-backed implementations of the trait seams declared in
//! `registry`, `audit`, and `jobs`. The rest of the crate depends only
//! on those traits; this module is the one place that depends on
//! `sqlx::PgPool`.

pub mod db;
pub mod repositories;

pub use db::Database;
