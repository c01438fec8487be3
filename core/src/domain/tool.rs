// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `Tool`.
//!
//! The original source's tool objects are variously ORM rows and ad-hoc
//! discovery payloads that happen to share an attribute set via dynamic
//! dispatch and duck typing. This workspace replaces
//! that with one concrete [`Tool`] type and a [`ToolLike`] trait so any
//! future projected view (e.g. a registry search result) can be filtered
//! and listed through the same code without runtime attribute probing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Low
    }
}

/// Fixed scope literals partitioning tools into disjoint MCP listings.
/// Kept as a thin newtype over `String` rather than
/// an enum so `Tool` rows loaded from the database (which may contain a
/// scope not yet known to this binary) never fail to deserialize —
/// validity against [`crate::config::SCOPES`] is checked at the HTTP
/// boundary, not at the data-model boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope(pub String);

impl Scope {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        crate::config::SCOPES.contains(&self.0.as_str())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub backend_url: String,
    pub scope: Scope,
    pub risk_level: RiskLevel,
    pub required_roles: Option<Vec<String>>,
    pub categories: Vec<String>,
    pub input_schema: Option<serde_json::Value>,
    pub is_active: bool,
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    /// RAG-MCP ranking hint only; never consulted by the v2 scoped
    /// dispatcher or by policy/registry correctness paths.
    pub embedding: Option<Vec<f32>>,
}

/// Attribute set every listing/dispatch path actually needs, implemented
/// by [`Tool`] today and available to a future projected view without
/// that view needing to fake the rest of [`Tool`]'s fields.
pub trait ToolLike {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn scope(&self) -> &str;
    fn required_roles(&self) -> Option<&[String]>;
    fn categories(&self) -> &[String];
    fn input_schema(&self) -> Option<&serde_json::Value>;

    fn is_core(&self) -> bool {
        self.categories().iter().any(|c| c == "core")
    }

    /// Per-tool `required_roles` gate, any-of semantics, applied
    /// regardless of wildcard standing.
    fn role_gate_passes(&self, user_roles: &std::collections::HashSet<String>) -> bool {
        match self.required_roles() {
            None => true,
            Some(roles) if roles.is_empty() => true,
            Some(roles) => roles.iter().any(|r| user_roles.contains(r)),
        }
    }
}

impl ToolLike for Tool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn scope(&self) -> &str {
        self.scope.as_str()
    }

    fn required_roles(&self) -> Option<&[String]> {
        self.required_roles.as_deref()
    }

    fn categories(&self) -> &[String] {
        &self.categories
    }

    fn input_schema(&self) -> Option<&serde_json::Value> {
        self.input_schema.as_ref()
    }
}

/// One entry in the startup YAML catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    pub backend_url: String,
    pub scope: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub required_roles: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub tools: Vec<CatalogEntry>,
}
