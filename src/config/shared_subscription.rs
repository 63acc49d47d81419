// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

/// `shared_subscription.policy` (spec §4.5, §9): how one member of a
/// `$share/<group>/...` group is picked to receive a given publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharedSubscriptionPolicy {
    Random,
    RoundRobin,
    HashClientId,
}

impl Default for SharedSubscriptionPolicy {
    fn default() -> Self {
        Self::RoundRobin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SharedSubscriptionConfig {
    #[serde(default)]
    pub policy: SharedSubscriptionPolicy,
}

impl Default for SharedSubscriptionConfig {
    fn default() -> Self {
        Self {
            policy: SharedSubscriptionPolicy::default(),
        }
    }
}
