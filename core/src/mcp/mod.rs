// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MCP Transport: JSON-RPC 2.0 envelope plus the scoped dispatcher serving
//! `/{scope}/sse`.

pub mod dispatcher;
pub mod schema;

pub use dispatcher::{Dispatcher, DispatcherDeps};
pub use schema::{error_codes, MCPRequest, MCPResponse, MCPToolCallParams, ToolSummary};
