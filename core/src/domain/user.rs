// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `UserClaims` / `AuthenticatedUser`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wildcard sentinel meaning "any tool name", still subject to
/// per-tool role gates and workspace denies.
pub const WILDCARD: &str = "*";

/// Claims extracted from a validated JWT. Unrecognized claims are
/// preserved in `extra` but never consulted by policy logic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    pub user_id: String,
    pub email: Option<String>,
    pub roles: HashSet<String>,
    pub groups: HashSet<String>,
    pub workspace: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl UserClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A claims-bearing caller plus the `allowed_tools` set derived from
/// policy at token-validation time. `allowed_tools` may contain
/// [`WILDCARD`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: UserClaims,
    pub allowed_tools: HashSet<String>,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.claims.user_id
    }

    pub fn roles(&self) -> &HashSet<String> {
        &self.claims.roles
    }

    pub fn is_admin(&self) -> bool {
        self.claims.has_role("admin")
    }

    /// Wildcard-aware set membership, without the per-tool role gate
    /// (that gate is applied separately at check-time).
    pub fn holds(&self, tool_name: &str) -> bool {
        self.allowed_tools.contains(WILDCARD) || self.allowed_tools.contains(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(roles: &[&str]) -> UserClaims {
        UserClaims {
            user_id: "u1".to_string(),
            email: None,
            roles: roles.iter().map(|s| s.to_string()).collect(),
            groups: HashSet::new(),
            workspace: None,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn wildcard_holds_any_tool_name() {
        let user = AuthenticatedUser {
            claims: claims(&["developer"]),
            allowed_tools: [WILDCARD.to_string()].into_iter().collect(),
        };
        assert!(user.holds("anything"));
    }

    #[test]
    fn non_wildcard_only_holds_listed_tools() {
        let user = AuthenticatedUser {
            claims: claims(&["developer"]),
            allowed_tools: ["exact_calculate".to_string()].into_iter().collect(),
        };
        assert!(user.holds("exact_calculate"));
        assert!(!user.holds("document_generate"));
    }
}
