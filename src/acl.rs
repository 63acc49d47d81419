// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-session ACL decision cache (spec §4.8): a bounded LRU keyed by
//! `(action, topic)`, owned exclusively by the session task (spec §5: "no
//! sharing"). On miss the broker runs the ACL chain and inserts; a
//! broadcast `empty_acl_cache()` call invalidates every session's cache on
//! any authorization rule change.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::collaborators::{AclAction, AuthDecision};

struct CacheEntry {
    decision: AuthDecision,
    inserted_at: Instant,
}

/// Bounded per-session cache of `(action, topic) -> allow/deny`.
pub struct AclCache {
    entries: LruCache<(AclAction, String), CacheEntry>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for AclCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclCache")
            .field("len", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl AclCache {
    /// # Panics
    ///
    /// Panics if `max_size` is zero; `Config::validate` rejects that before
    /// a cache is ever constructed.
    #[must_use]
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(max_size).expect("acl.cache.max_size must be positive");
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Returns the cached decision for `(action, topic)`, treating an entry
    /// older than the configured TTL as a miss.
    pub fn get(&mut self, action: AclAction, topic: &str) -> Option<AuthDecision> {
        let key = (action, topic.to_string());
        let hit = self.entries.get(&key)?;
        if let Some(ttl) = self.ttl {
            if hit.inserted_at.elapsed() > ttl {
                self.entries.pop(&key);
                return None;
            }
        }
        Some(hit.decision)
    }

    /// Inserts a freshly computed decision, evicting the least recently
    /// used entry if the cache is at capacity.
    pub fn insert(&mut self, action: AclAction, topic: &str, decision: AuthDecision) {
        self.entries.put(
            (action, topic.to_string()),
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Broadcast hook: `empty_acl_cache()` (spec §4.8), invoked on any
    /// authorization rule change.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_insert_then_hit() {
        let mut cache = AclCache::new(4, None);
        assert!(cache.get(AclAction::Publish, "a/b").is_none());
        cache.insert(AclAction::Publish, "a/b", AuthDecision::Allow);
        assert_eq!(cache.get(AclAction::Publish, "a/b"), Some(AuthDecision::Allow));
    }

    #[test]
    fn lru_evicts_oldest_beyond_capacity() {
        let mut cache = AclCache::new(2, None);
        cache.insert(AclAction::Subscribe, "a", AuthDecision::Allow);
        cache.insert(AclAction::Subscribe, "b", AuthDecision::Allow);
        cache.insert(AclAction::Subscribe, "c", AuthDecision::Allow);
        assert!(cache.get(AclAction::Subscribe, "a").is_none());
        assert!(cache.get(AclAction::Subscribe, "c").is_some());
    }

    #[test]
    fn ttl_expires_entries() {
        let mut cache = AclCache::new(4, Some(Duration::from_millis(0)));
        cache.insert(AclAction::Publish, "a/b", AuthDecision::Deny);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(AclAction::Publish, "a/b").is_none());
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = AclCache::new(4, None);
        cache.insert(AclAction::Publish, "a/b", AuthDecision::Allow);
        cache.clear();
        assert!(cache.is_empty());
    }
}
