// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! TTL cache for registry views, matching the 5-minute TTL of
//! `examples/original_source/src/registry/service.py`'s
//! `cachetools.TTLCache(maxsize=1000, ttl=300)`. `maxsize` is dropped: the
//! gateway caches a handful of whole-collection views (all tools, one per
//! scope, core tools), never a per-key cache unbounded by user count.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn fresh(&self, now: Instant) -> Option<T> {
        let slot = self.slot.read();
        slot.as_ref().and_then(|(stored_at, value)| {
            if now.saturating_duration_since(*stored_at) < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub fn store(&self, now: Instant, value: T) {
        *self.slot.write() = Some((now, value));
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}
