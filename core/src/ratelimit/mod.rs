// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rate Limiter: dual-key token-bucket limiting per user and per tool.

pub mod bucket;
pub mod limiter;

pub use bucket::TokenBucket;
pub use limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
