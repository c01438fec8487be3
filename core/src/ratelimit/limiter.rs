// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `RateLimiter`: dual-key token-bucket limiting. A
//! generous per-user bucket is consumed first, then a stricter
//! per-user+tool bucket only if the user bucket allowed the request.
//! Either denial short-circuits without consuming the other bucket.
//! Grounded on
//! `examples/original_source/src/ratelimit/limiter.py`'s `RateLimiter`,
//! `RateLimitConfig`, and `RateLimitResult`.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::bucket::TokenBucket;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

impl RateLimitConfig {
    pub fn tokens_per_second(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: f64,
    pub retry_after: f64,
}

impl RateLimitResult {
    fn allow(limit: u32, remaining: f64) -> Self {
        RateLimitResult {
            allowed: true,
            limit,
            remaining,
            retry_after: 0.0,
        }
    }

    fn deny(limit: u32, remaining: f64, retry_after: f64) -> Self {
        RateLimitResult {
            allowed: false,
            limit,
            remaining,
            retry_after,
        }
    }
}

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const STALE_AFTER: Duration = Duration::from_secs(600);

/// Holds one bucket per key. Keys are `user:{id}` and
/// `user:{id}:tool:{name}`, matching the original's key scheme exactly so
/// audit rows and operator intuition carry over.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    last_cleanup: Mutex<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            buckets: DashMap::new(),
            last_cleanup: Mutex::new(Instant::now()),
        }
    }

    fn check_key(&self, key: &str, config: RateLimitConfig, now: Instant) -> RateLimitResult {
        self.maybe_cleanup(now);
        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            TokenBucket::new(config.burst_size as f64, config.tokens_per_second(), now)
        });
        let (allowed, remaining, retry_after) = entry.consume(1.0, now);
        if allowed {
            RateLimitResult::allow(config.requests_per_minute, remaining)
        } else {
            RateLimitResult::deny(config.requests_per_minute, remaining, retry_after)
        }
    }

    /// Consume the user bucket; only if that allows, consume the
    /// user+tool bucket (when `tool_name` is given). Either
    /// denial short-circuits — the second bucket is never touched if the
    /// first denies.
    pub fn check(
        &self,
        user_id: &str,
        tool_name: Option<&str>,
        user_config: RateLimitConfig,
        tool_config: RateLimitConfig,
        now: Instant,
    ) -> RateLimitResult {
        let user_key = format!("user:{user_id}");
        let user_result = self.check_key(&user_key, user_config, now);
        if !user_result.allowed {
            return user_result;
        }
        match tool_name {
            None => user_result,
            Some(tool) => {
                let tool_key = format!("user:{user_id}:tool:{tool}");
                self.check_key(&tool_key, tool_config, now)
            }
        }
    }

    fn maybe_cleanup(&self, now: Instant) {
        let mut last = self.last_cleanup.lock();
        if now.saturating_duration_since(*last) < CLEANUP_INTERVAL {
            return;
        }
        *last = now;
        drop(last);
        self.buckets.retain(|_, bucket| bucket.idle_for(now) < STALE_AFTER);
    }
}
