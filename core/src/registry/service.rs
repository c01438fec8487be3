// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `ToolRegistry`: cached, policy-filtered tool listings. Grounded on
//! `examples/original_source/src/registry/service.py` (`_tool_cache`,
//! `get_all_tools_cached`, `get_tools_for_user`) and
//! `examples/original_source/src/registry/repository.py`
//! (`deactivate_tools_not_in_list`, `increment_tool_usage`).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Catalog, CatalogEntry, Tool, ToolLike, UserClaims};
use crate::policy::PolicyEngine;

use super::cache::TtlCache;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("catalog has duplicate tool name {0:?}")]
    DuplicateCatalogEntry(String),
    #[error(transparent)]
    Repository(#[from] sqlx::Error),
}

/// Persistence seam for tool rows. Implemented by
/// `infrastructure::repositories::tools::PgToolRepository`; kept as a
/// trait so the registry's caching and policy-intersection logic can be
/// unit-tested without a database.
#[async_trait]
pub trait ToolRepository: Send + Sync {
    async fn all_active(&self) -> Result<Vec<Tool>, sqlx::Error>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Tool>, sqlx::Error>;
    async fn upsert_from_catalog(&self, entry: &CatalogEntry) -> Result<(), sqlx::Error>;
    async fn deactivate_not_in(&self, active_names: &[String]) -> Result<(), sqlx::Error>;
    async fn increment_usage(&self, name: &str) -> Result<(), sqlx::Error>;
}

pub struct ToolRegistry {
    repository: Arc<dyn ToolRepository>,
    cache: TtlCache<Arc<Vec<Tool>>>,
}

impl ToolRegistry {
    pub fn new(repository: Arc<dyn ToolRepository>, ttl: std::time::Duration) -> Self {
        ToolRegistry {
            repository,
            cache: TtlCache::new(ttl),
        }
    }

    /// Startup YAML sync: upsert every catalog entry by
    /// name, then deactivate any active tool row whose name is absent
    /// from the catalog. A catalog with a repeated name is a startup
    /// error rather than a silent last-write-wins.
    pub async fn sync_catalog(&self, catalog: &Catalog) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for entry in &catalog.tools {
            if !seen.insert(entry.name.clone()) {
                return Err(RegistryError::DuplicateCatalogEntry(entry.name.clone()));
            }
        }
        for entry in &catalog.tools {
            self.repository.upsert_from_catalog(entry).await?;
        }
        let active_names: Vec<String> = catalog
            .tools
            .iter()
            .filter(|e| e.is_active)
            .map(|e| e.name.clone())
            .collect();
        self.repository.deactivate_not_in(&active_names).await?;
        self.cache.invalidate();
        Ok(())
    }

    async fn cached_all_active(&self) -> Result<Arc<Vec<Tool>>, RegistryError> {
        let now = Instant::now();
        if let Some(cached) = self.cache.fresh(now) {
            return Ok(cached);
        }
        let fresh = Arc::new(self.repository.all_active().await?);
        self.cache.store(now, fresh.clone());
        Ok(fresh)
    }

    pub async fn all_active_tools(&self) -> Result<Arc<Vec<Tool>>, RegistryError> {
        self.cached_all_active().await
    }

    pub async fn tools_by_scope(&self, scope: &str) -> Result<Vec<Tool>, RegistryError> {
        let all = self.cached_all_active().await?;
        Ok(all.iter().filter(|t| t.scope() == scope).cloned().collect())
    }

    pub async fn core_tools(&self) -> Result<Vec<Tool>, RegistryError> {
        let all = self.cached_all_active().await?;
        Ok(all.iter().filter(|t| t.is_core()).cloned().collect())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Tool>, RegistryError> {
        Ok(self.repository.find_by_name(name).await?)
    }

    /// Per-user listing: wildcard-aware intersection with the policy
    /// engine's allowed set, filtered again by each tool's own
    /// `required_roles` gate, sorted by name for a stable response.
    pub async fn tools_for_user(
        &self,
        claims: &UserClaims,
        policy: &PolicyEngine,
        scope: Option<&str>,
    ) -> Result<Vec<Tool>, RegistryError> {
        let all = self.cached_all_active().await?;
        let all_names: HashSet<String> = all.iter().map(|t| t.name.clone()).collect();
        let allowed_names = policy.allowed_tool_names(claims, &all_names);

        let mut visible: Vec<Tool> = all
            .iter()
            .filter(|t| scope.is_none_or_eq(t.scope()))
            .filter(|t| allowed_names.contains(&t.name))
            .filter(|t| t.role_gate_passes(&claims.roles))
            .filter(|t| policy.policy_tool_role_gate_passes(&t.name, &claims.roles))
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(visible)
    }

    /// Only called by the gateway service after a successful backend
    /// response — never on a denied or failed invocation.
    pub async fn increment_usage(&self, name: &str) -> Result<(), RegistryError> {
        Ok(self.repository.increment_usage(name).await?)
    }
}

trait OptionScopeExt {
    fn is_none_or_eq(&self, value: &str) -> bool;
}

impl OptionScopeExt for Option<&str> {
    fn is_none_or_eq(&self, value: &str) -> bool {
        match self {
            None => true,
            Some(expected) => *expected == value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskLevel, Scope};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    struct FakeRepository {
        tools: Mutex<Vec<Tool>>,
    }

    #[async_trait]
    impl ToolRepository for FakeRepository {
        async fn all_active(&self) -> Result<Vec<Tool>, sqlx::Error> {
            Ok(self.tools.lock().iter().filter(|t| t.is_active).cloned().collect())
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Tool>, sqlx::Error> {
            Ok(self.tools.lock().iter().find(|t| t.name == name).cloned())
        }

        async fn upsert_from_catalog(&self, _entry: &CatalogEntry) -> Result<(), sqlx::Error> {
            Ok(())
        }

        async fn deactivate_not_in(&self, _active_names: &[String]) -> Result<(), sqlx::Error> {
            Ok(())
        }

        async fn increment_usage(&self, name: &str) -> Result<(), sqlx::Error> {
            if let Some(tool) = self.tools.lock().iter_mut().find(|t| t.name == name) {
                tool.usage_count += 1;
            }
            Ok(())
        }
    }

    fn tool(name: &str, scope: &str, required_roles: Option<Vec<String>>) -> Tool {
        Tool {
            id: 1,
            name: name.to_string(),
            description: "d".to_string(),
            backend_url: "http://backend.internal".to_string(),
            scope: Scope(scope.to_string()),
            risk_level: RiskLevel::Low,
            required_roles,
            categories: vec![],
            input_schema: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            embedding: None,
        }
    }

    fn claims(roles: &[&str]) -> UserClaims {
        UserClaims {
            user_id: "u1".to_string(),
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            groups: HashSet::new(),
            workspace: None,
            extra: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn tools_for_user_respects_role_gate_even_with_wildcard_policy() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![
                tool("calc.add", "calculator", None),
                tool("git.commit", "git", Some(vec!["release-manager".to_string()])),
            ]),
        });
        let registry = ToolRegistry::new(repo, std::time::Duration::from_secs(300));

        let mut policy_config = crate::domain::PolicyConfig::default();
        policy_config.roles.insert(
            "admin".to_string(),
            crate::domain::RoleConfig {
                allowed_tools: vec![crate::domain::WILDCARD.to_string()],
            },
        );
        let policy = PolicyEngine::new(policy_config);

        let visible = registry
            .tools_for_user(&claims(&["admin"]), &policy, None)
            .await
            .unwrap();
        let names: Vec<&str> = visible.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["calc.add"]);
    }

    #[tokio::test]
    async fn tools_for_user_respects_policy_tools_override() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", None)]),
        });
        let registry = ToolRegistry::new(repo, std::time::Duration::from_secs(300));

        let mut policy_config = crate::domain::PolicyConfig::default();
        policy_config.roles.insert(
            "admin".to_string(),
            crate::domain::RoleConfig {
                allowed_tools: vec![crate::domain::WILDCARD.to_string()],
            },
        );
        policy_config.tools.insert(
            "calc.add".to_string(),
            crate::domain::ToolConfig {
                required_roles: vec!["release-manager".to_string()],
            },
        );
        let policy = PolicyEngine::new(policy_config);

        let visible = registry.tools_for_user(&claims(&["admin"]), &policy, None).await.unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn tools_by_scope_filters_and_cache_is_reused() {
        let repo = Arc::new(FakeRepository {
            tools: Mutex::new(vec![tool("calc.add", "calculator", None), tool("git.commit", "git", None)]),
        });
        let registry = ToolRegistry::new(repo, std::time::Duration::from_secs(300));
        let calc_tools = registry.tools_by_scope("calculator").await.unwrap();
        assert_eq!(calc_tools.len(), 1);
        assert_eq!(calc_tools[0].name, "calc.add");
    }
}
