// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// `acl.cache.*` config (spec §4.8, §9): per-session LRU size and staleness
/// bound for the (action, topic) -> decision cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AclCacheConfig {
    #[serde(default = "AclCacheConfig::default_max_size")]
    pub max_size: usize,

    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl AclCacheConfig {
    #[must_use]
    pub const fn default_max_size() -> usize {
        128
    }
}

impl Default for AclCacheConfig {
    fn default() -> Self {
        Self {
            max_size: Self::default_max_size(),
            ttl_secs: None,
        }
    }
}
