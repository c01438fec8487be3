// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `PolicyConfig`, loaded from `policy.yaml` by
//! [`crate::policy::engine::PolicyEngine`]. Field shape grounded on
//! `examples/original_source/src/auth/policy.py`'s `PolicyConfig`.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub denied_tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub required_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_action")]
    pub default_action: String,
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    #[serde(default)]
    pub workspaces: HashMap<String, WorkspaceConfig>,
    #[serde(default)]
    pub tools: HashMap<String, ToolConfig>,
}

fn default_action() -> String {
    "deny".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            default_action: default_action(),
            roles: HashMap::new(),
            workspaces: HashMap::new(),
            tools: HashMap::new(),
        }
    }
}
