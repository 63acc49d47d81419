// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared-subscription group member selection (spec §4.5, §8 property 5).
//! Round-robin cursor state (SPEC_FULL §3) is keyed by group name rather
//! than by a `Vec` index, so a member leaving mid-rotation does not skip or
//! double-serve the next member beyond the `N/k +/- 1` bound.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::SharedSubscriptionPolicy;
use crate::types::SessionGid;

/// Per-group round-robin cursors, keyed by group name so membership churn
/// in one group never perturbs another's rotation.
#[derive(Debug, Default)]
pub struct SharedGroupCursors {
    cursors: Mutex<HashMap<String, usize>>,
}

impl SharedGroupCursors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks exactly one session from `members` for group `group_name`
    /// under `policy` (spec §4.5). `members` must be non-empty; callers
    /// filter empty groups out before calling.
    #[must_use]
    pub fn pick<'a>(
        &self,
        policy: SharedSubscriptionPolicy,
        group_name: &str,
        members: &'a [SessionGid],
        publisher_client_id: &str,
    ) -> &'a SessionGid {
        debug_assert!(!members.is_empty());
        match policy {
            SharedSubscriptionPolicy::Random => {
                let index = rand::rng().random_range(0..members.len());
                &members[index]
            }
            SharedSubscriptionPolicy::RoundRobin => {
                let mut cursors = self.cursors.lock();
                let cursor = cursors.entry(group_name.to_string()).or_insert(0);
                let index = *cursor % members.len();
                *cursor = cursor.wrapping_add(1);
                &members[index]
            }
            SharedSubscriptionPolicy::HashClientId => {
                let mut hasher = DefaultHasher::new();
                publisher_client_id.hash(&mut hasher);
                let index = (hasher.finish() as usize) % members.len();
                &members[index]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gids(n: u64) -> Vec<SessionGid> {
        (0..n).map(|i| SessionGid::new(0, i)).collect()
    }

    #[test]
    fn round_robin_cycles_evenly() {
        let cursors = SharedGroupCursors::new();
        let members = gids(3);
        let mut counts = HashMap::new();
        for _ in 0..6 {
            let picked = *cursors.pick(SharedSubscriptionPolicy::RoundRobin, "g", &members, "pub");
            *counts.entry(picked).or_insert(0) += 1;
        }
        for count in counts.values() {
            assert_eq!(*count, 2, "round robin over 6 publishes to 3 members should be 2 each");
        }
    }

    #[test]
    fn round_robin_survives_membership_change_without_skew_beyond_bound() {
        let cursors = SharedGroupCursors::new();
        let members_before = gids(3);
        for _ in 0..3 {
            cursors.pick(SharedSubscriptionPolicy::RoundRobin, "g", &members_before, "pub");
        }
        // Member 1 leaves; group now has 2 members but the cursor keeps counting.
        let members_after = vec![members_before[0], members_before[2]];
        let mut counts = HashMap::new();
        for _ in 0..4 {
            let picked = *cursors.pick(SharedSubscriptionPolicy::RoundRobin, "g", &members_after, "pub");
            *counts.entry(picked).or_insert(0) += 1;
        }
        let max = *counts.values().max().unwrap();
        let min = *counts.values().min().unwrap();
        assert!(max - min <= 1, "fairness bound N/k +/- 1 violated");
    }

    #[test]
    fn hash_clientid_is_deterministic_for_same_publisher() {
        let cursors = SharedGroupCursors::new();
        let members = gids(5);
        let a = *cursors.pick(SharedSubscriptionPolicy::HashClientId, "g", &members, "B");
        let b = *cursors.pick(SharedSubscriptionPolicy::HashClientId, "g", &members, "B");
        assert_eq!(a, b);
    }
}
