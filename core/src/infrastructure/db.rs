// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thin `Database` newtype wrapping `sqlx::PgPool`, shared by every
//! repository in `infrastructure::repositories`. Migrations live in the
//! `tool-gateway` binary crate (`sqlx::migrate!` needs a path relative
//! to the crate invoking it) and are run against the pool returned by
//! [`Database::pool`] before the server starts accepting connections.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
