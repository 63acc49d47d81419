// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// `retained.storage` (spec §9): whether the retained store is purely
/// in-memory or backed by durable storage. The routing core only needs to
/// know which persistence contract it is talking to; the actual storage
/// engine is an external collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetainedStorage {
    Memory,
    Durable,
}

impl Default for RetainedStorage {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetainedConfig {
    #[serde(default)]
    pub storage: RetainedStorage,
}

impl Default for RetainedConfig {
    fn default() -> Self {
        Self {
            storage: RetainedStorage::default(),
        }
    }
}
