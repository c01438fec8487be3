// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool Registry: catalog sync, TTL cache, and per-user listings.

pub mod cache;
pub mod service;

pub use service::{RegistryError, ToolRegistry};
