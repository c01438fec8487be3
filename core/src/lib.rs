// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # gateway-core
//!
//! Domain model, policy engine, rate limiter, registry, audit recorder,
//! backend proxy, MCP transport, and async job runner for the tool
//! invocation gateway. The `tool-gateway` binary crate wires this crate's
//! [`http::router`] into a running process; everything else (env parsing,
//! tracing/metrics init, signal handling) lives there.
//!
//! ## Layer structure
//!
//! ```text
//! http/            ← axum routes, JSON-RPC envelope (de)serialization
//!     ↓
//! mcp/              ← scoped MCP dispatcher (initialize/tools.list/tools.call)
//! gateway/          ← single-invocation orchestration
//! jobs/             ← async job lifecycle, background runner
//!     ↓
//! auth/ policy/ registry/ ratelimit/ audit/ proxy/  ← the named components
//!     ↓
//! domain/           ← value types, no I/O
//! infrastructure/   ← sqlx pool + repositories
//! ```

pub mod config;
pub mod error;
pub mod domain;
pub mod auth;
pub mod policy;
pub mod registry;
pub mod ratelimit;
pub mod audit;
pub mod proxy;
pub mod gateway;
pub mod mcp;
pub mod jobs;
pub mod infrastructure;
pub mod http;

pub use config::Settings;
pub use error::GatewayError;
