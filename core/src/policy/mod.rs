// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Policy Engine: role/workspace-derived tool allowlists and per-tool
//! role gates.

pub mod engine;

pub use engine::{PolicyEngine, PolicyError};
