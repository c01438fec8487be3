// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP Surface. The axum router and the handlers wiring
//! every named component into request/response cycles. The `tool-gateway`
//! binary only needs to build an [`AppState`] and call [`router`].

pub mod admin;
pub mod auth_extractor;
pub mod health;
pub mod jobs;
pub mod mcp_routes;
pub mod router;
pub mod state;
pub mod tools;

pub use auth_extractor::AuthRejection;
pub use router::router;
pub use state::AppState;
