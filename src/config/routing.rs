// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::route::LockMode;

/// `routing.*` config (spec §9): how wildcard trie updates synchronize
/// across the cluster and how many router workers shard route mutations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "RoutingConfig::default_lock_mode")]
    pub lock_mode: LockMode,

    #[serde(default = "RoutingConfig::default_worker_pool_size")]
    pub worker_pool_size: usize,
}

impl RoutingConfig {
    #[must_use]
    pub const fn default_lock_mode() -> LockMode {
        LockMode::Key
    }

    #[must_use]
    pub const fn default_worker_pool_size() -> usize {
        8
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            lock_mode: Self::default_lock_mode(),
            worker_pool_size: Self::default_worker_pool_size(),
        }
    }
}
