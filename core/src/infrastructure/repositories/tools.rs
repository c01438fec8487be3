// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `PgToolRepository`, backed by the `tools` table
//! (`name` unique and indexed). Backs
//! [`crate::registry::service::ToolRegistry`].

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::domain::{CatalogEntry, RiskLevel, Scope, Tool};
use crate::registry::service::ToolRepository;

pub struct PgToolRepository {
    pool: PgPool,
}

impl PgToolRepository {
    pub fn new(pool: PgPool) -> Self {
        PgToolRepository { pool }
    }
}

fn row_to_tool(row: sqlx::postgres::PgRow) -> Tool {
    let risk_level_str: String = row.get("risk_level");
    let risk_level = match risk_level_str.as_str() {
        "medium" => RiskLevel::Medium,
        "high" => RiskLevel::High,
        _ => RiskLevel::Low,
    };
    Tool {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        backend_url: row.get("backend_url"),
        scope: Scope(row.get("scope")),
        risk_level,
        required_roles: row.get("required_roles"),
        categories: row.get::<Option<Vec<String>>, _>("categories").unwrap_or_default(),
        input_schema: row.get("input_schema"),
        is_active: row.get("is_active"),
        usage_count: row.get("usage_count"),
        last_used_at: row.get("last_used_at"),
        embedding: None,
    }
}

fn risk_level_str(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    }
}

const SELECT_COLUMNS: &str = "id, name, description, backend_url, scope, risk_level, \
    required_roles, categories, input_schema, is_active, usage_count, last_used_at";

#[async_trait]
impl ToolRepository for PgToolRepository {
    async fn all_active(&self) -> Result<Vec<Tool>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM tools WHERE is_active = true ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_tool).collect())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tool>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM tools WHERE name = $1"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_tool))
    }

    /// Upserts one catalog entry by name, as part of the startup sync.
    /// `usage_count` and `last_used_at` are never touched here — only by
    /// [`Self::increment_usage`].
    async fn upsert_from_catalog(&self, entry: &CatalogEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO tools (
                name, description, backend_url, scope, risk_level,
                required_roles, categories, input_schema, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE SET
                description = EXCLUDED.description,
                backend_url = EXCLUDED.backend_url,
                scope = EXCLUDED.scope,
                risk_level = EXCLUDED.risk_level,
                required_roles = EXCLUDED.required_roles,
                categories = EXCLUDED.categories,
                input_schema = EXCLUDED.input_schema,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&entry.backend_url)
        .bind(&entry.scope)
        .bind(risk_level_str(entry.risk_level))
        .bind(&entry.required_roles)
        .bind(&entry.categories)
        .bind(&entry.input_schema)
        .bind(entry.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate_not_in(&self, active_names: &[String]) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE tools SET is_active = false WHERE NOT (name = ANY($1))")
            .bind(active_names)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_usage(&self, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tools SET usage_count = usage_count + 1, last_used_at = now() WHERE name = $1",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
