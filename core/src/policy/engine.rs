// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy Engine. Grounded on
//! `examples/original_source/src/auth/policy.py`'s `load_policy`,
//! `get_allowed_tools_for_user`, and `check_tool_permission`, with two
//! deliberate departures recorded in DESIGN.md:
//!
//! 1. Denied tools are removed from a user's allowed set unconditionally.
//!    The original skips this subtraction for a user who is both `admin`
//!    and holds the `*` wildcard; denies must always win here instead.
//! 2. A tool's own `required_roles` gate ([`crate::domain::ToolLike::role_gate_passes`])
//!    is checked regardless of wildcard standing. The original's
//!    `check_tool_permission` returns early on a wildcard match, before
//!    that gate runs.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::domain::{PolicyConfig, ToolLike, UserClaims, WILDCARD};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path:?}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse policy file {path:?}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("tool {0:?} is not allowed for this user")]
    NotAllowed(String),
}

/// Holds the current [`PolicyConfig`] behind a lock so an operator can
/// reload `policy.yaml` without restarting the process. Reads are cheap
/// (`Arc` clone); writes only happen on reload.
pub struct PolicyEngine {
    config: RwLock<Arc<PolicyConfig>>,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        PolicyEngine {
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Default-deny on a missing file, matching `load_policy`'s behavior
    /// in the original source.
    pub fn load_from_path(path: &str) -> Result<PolicyConfig, PolicyError> {
        let raw = fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| PolicyError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_path(path: &str) -> Result<Self, PolicyError> {
        Ok(PolicyEngine::new(PolicyEngine::load_from_path(path)?))
    }

    pub fn reload(&self, path: &str) -> Result<(), PolicyError> {
        let fresh = PolicyEngine::load_from_path(path)?;
        *self.config.write() = Arc::new(fresh);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        self.config.read().clone()
    }

    /// Names the user may invoke, expanded from role/workspace grants,
    /// wildcard-expanded against `all_tool_names`, and denylist-filtered.
    /// Does not check any tool's own `required_roles` gate — callers must
    /// additionally call [`ToolLike::role_gate_passes`] per tool, or use
    /// [`PolicyEngine::check_tool_permission`] for the full check.
    pub fn allowed_tool_names(
        &self,
        claims: &UserClaims,
        all_tool_names: &HashSet<String>,
    ) -> HashSet<String> {
        let config = self.snapshot();
        let mut allowed: HashSet<String> = HashSet::new();
        let mut denied: HashSet<String> = HashSet::new();

        for role in &claims.roles {
            if let Some(role_config) = config.roles.get(role) {
                allowed.extend(role_config.allowed_tools.iter().cloned());
            }
        }
        if let Some(workspace) = &claims.workspace {
            if let Some(workspace_config) = config.workspaces.get(workspace) {
                // A concrete workspace allowlist *replaces* the role union;
                // a workspace "*" only adds the wildcard sentinel to
                // whatever the roles already granted.
                if workspace_config.allowed_tools.iter().any(|t| t == WILDCARD) {
                    allowed.insert(WILDCARD.to_string());
                } else if !workspace_config.allowed_tools.is_empty() {
                    allowed = workspace_config.allowed_tools.iter().cloned().collect();
                }
                denied.extend(workspace_config.denied_tools.iter().cloned());
            }
        }

        if allowed.contains(WILDCARD) {
            allowed = all_tool_names.clone();
        }

        for name in &denied {
            allowed.remove(name);
        }
        allowed
    }

    /// Name-level check only (wildcard-aware, deny-filtered). Use
    /// [`PolicyEngine::check_tool_permission`] when a concrete tool is in
    /// hand so its `required_roles` gate is also enforced.
    pub fn is_tool_name_allowed(
        &self,
        claims: &UserClaims,
        tool_name: &str,
        all_tool_names: &HashSet<String>,
    ) -> bool {
        self.allowed_tool_names(claims, all_tool_names).contains(tool_name)
    }

    /// Policy-level override: a tool named in `policy.tools` with a
    /// non-empty `required_roles` gates access independently of
    /// [`ToolLike::role_gate_passes`] (the catalog's own per-tool
    /// `required_roles` attribute). Both gates are enforced at
    /// check-time — a tool absent from `policy.tools`, or
    /// present with an empty list, passes this gate unconditionally.
    pub fn policy_tool_role_gate_passes(&self, tool_name: &str, user_roles: &HashSet<String>) -> bool {
        match self.snapshot().tools.get(tool_name) {
            None => true,
            Some(tool_config) if tool_config.required_roles.is_empty() => true,
            Some(tool_config) => tool_config.required_roles.iter().any(|r| user_roles.contains(r)),
        }
    }

    /// Full permission check for an invocation attempt: the user must
    /// hold the tool by name (directly or via wildcard, minus denies) and
    /// must satisfy both the tool's own `required_roles` gate and any
    /// `policy.tools` override.
    pub fn check_tool_permission<T: ToolLike>(
        &self,
        claims: &UserClaims,
        tool: &T,
        all_tool_names: &HashSet<String>,
    ) -> Result<(), PolicyError> {
        if !self.is_tool_name_allowed(claims, tool.name(), all_tool_names) {
            return Err(PolicyError::NotAllowed(tool.name().to_string()));
        }
        if !tool.role_gate_passes(&claims.roles) {
            return Err(PolicyError::NotAllowed(tool.name().to_string()));
        }
        if !self.policy_tool_role_gate_passes(tool.name(), &claims.roles) {
            return Err(PolicyError::NotAllowed(tool.name().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoleConfig, WorkspaceConfig};
    use std::collections::HashMap;

    fn claims(roles: &[&str], workspace: Option<&str>) -> UserClaims {
        UserClaims {
            user_id: "u1".to_string(),
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            groups: HashSet::new(),
            workspace: workspace.map(String::from),
            extra: HashMap::new(),
        }
    }

    fn all_tools() -> HashSet<String> {
        ["calc.add", "git.commit", "docs.search"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn role_grant_without_wildcard_is_exact() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "developer".to_string(),
            RoleConfig {
                allowed_tools: vec!["calc.add".to_string()],
            },
        );
        let engine = PolicyEngine::new(config);
        let allowed = engine.allowed_tool_names(&claims(&["developer"], None), &all_tools());
        assert_eq!(allowed, ["calc.add".to_string()].into_iter().collect());
    }

    #[test]
    fn wildcard_expands_to_all_known_tools() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![WILDCARD.to_string()],
            },
        );
        let engine = PolicyEngine::new(config);
        let allowed = engine.allowed_tool_names(&claims(&["admin"], None), &all_tools());
        assert_eq!(allowed, all_tools());
    }

    #[test]
    fn deny_always_wins_even_for_admin_wildcard() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![WILDCARD.to_string()],
            },
        );
        config.workspaces.insert(
            "acme".to_string(),
            WorkspaceConfig {
                allowed_tools: vec![],
                denied_tools: vec!["git.commit".to_string()],
            },
        );
        let engine = PolicyEngine::new(config);
        let allowed = engine.allowed_tool_names(&claims(&["admin"], Some("acme")), &all_tools());
        assert!(!allowed.contains("git.commit"));
        assert!(allowed.contains("calc.add"));
    }

    #[test]
    fn concrete_workspace_allowlist_replaces_role_union() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "developer".to_string(),
            RoleConfig {
                allowed_tools: vec!["calc.add".to_string(), "git.commit".to_string()],
            },
        );
        config.workspaces.insert(
            "acme".to_string(),
            WorkspaceConfig {
                allowed_tools: vec!["docs.search".to_string()],
                denied_tools: vec![],
            },
        );
        let engine = PolicyEngine::new(config);
        let allowed = engine.allowed_tool_names(&claims(&["developer"], Some("acme")), &all_tools());
        assert_eq!(allowed, ["docs.search".to_string()].into_iter().collect());
    }

    #[test]
    fn workspace_wildcard_only_adds_sentinel() {
        let mut config = PolicyConfig::default();
        config.roles.insert(
            "developer".to_string(),
            RoleConfig {
                allowed_tools: vec!["calc.add".to_string()],
            },
        );
        config.workspaces.insert(
            "acme".to_string(),
            WorkspaceConfig {
                allowed_tools: vec![WILDCARD.to_string()],
                denied_tools: vec![],
            },
        );
        let engine = PolicyEngine::new(config);
        let allowed = engine.allowed_tool_names(&claims(&["developer"], Some("acme")), &all_tools());
        assert_eq!(allowed, all_tools());
    }

    #[test]
    fn wildcard_does_not_bypass_per_tool_required_roles() {
        use crate::domain::{RiskLevel, Scope, Tool};

        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![WILDCARD.to_string()],
            },
        );
        let engine = PolicyEngine::new(config);

        let tool = Tool {
            id: 1,
            name: "git.commit".to_string(),
            description: "commit".to_string(),
            backend_url: "http://git.internal".to_string(),
            scope: Scope("git".to_string()),
            risk_level: RiskLevel::High,
            required_roles: Some(vec!["release-manager".to_string()]),
            categories: vec![],
            input_schema: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            embedding: None,
        };

        let result = engine.check_tool_permission(&claims(&["admin"], None), &tool, &all_tools());
        assert!(result.is_err());
    }

    #[test]
    fn policy_tools_override_gates_independently_of_catalog_required_roles() {
        use crate::domain::{RiskLevel, Scope, Tool, ToolConfig};

        let mut config = PolicyConfig::default();
        config.roles.insert(
            "admin".to_string(),
            RoleConfig {
                allowed_tools: vec![WILDCARD.to_string()],
            },
        );
        config.tools.insert(
            "calc.add".to_string(),
            ToolConfig {
                required_roles: vec!["release-manager".to_string()],
            },
        );
        let engine = PolicyEngine::new(config);

        let tool = Tool {
            id: 1,
            name: "calc.add".to_string(),
            description: "add".to_string(),
            backend_url: "http://calc.internal".to_string(),
            scope: Scope("calculator".to_string()),
            risk_level: RiskLevel::Low,
            required_roles: None,
            categories: vec![],
            input_schema: None,
            is_active: true,
            usage_count: 0,
            last_used_at: None,
            embedding: None,
        };

        assert!(engine.check_tool_permission(&claims(&["admin"], None), &tool, &all_tools()).is_err());
        assert!(engine
            .check_tool_permission(&claims(&["admin", "release-manager"], None), &tool, &all_tools())
            .is_ok());
    }
}
