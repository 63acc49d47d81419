// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::topic::{Filter, Topic};
use crate::trie::Trie;
use crate::types::NodeId;

/// Synchronization mode for wildcard trie updates across the cluster
/// (spec §4.4, §9). The core behaves correctly under all three; the
/// deployment picks based on cluster size and collision rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Fine-grained per-key locks; trie updates ride inside the KV transaction.
    Key,
    /// A table-scoped lock is acquired before the transaction commits.
    Tab,
    /// A cluster-wide advisory lock guards every wildcard route change.
    Global,
}

impl Default for LockMode {
    fn default() -> Self {
        Self::Key
    }
}

/// A destination for a route: a bare node, or a `(share_group, node)` pair
/// when the subscription behind it is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Node(NodeId),
    Shared { group: String, node: NodeId },
}

impl Destination {
    #[must_use]
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Node(n) | Self::Shared { node: n, .. } => *n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub filter: String,
    pub destination: Destination,
}

/// One shard of the replicated route table. Exactly one router worker ever
/// holds the write lock for a given shard at a time (spec §4.4: "only the
/// worker shard touches the trie's critical section for that key"); reads
/// from the dispatch path take the read lock and see a consistent snapshot.
#[derive(Debug, Default)]
pub struct RouteTable {
    /// filter -> bag of destinations (duplicates across nodes form a bag).
    routes: RwLock<HashMap<String, Vec<Destination>>>,
    trie: RwLock<Trie>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route. Idempotent bag semantics: the same `(filter, destination)`
    /// pair may be added more than once by replays of the same membership
    /// event; duplicates are folded rather than appended again.
    pub fn add_route(&self, filter: &Filter, destination: Destination) {
        let mut routes = self.routes.write();
        let bag = routes.entry(filter.as_str().to_string()).or_default();
        if !bag.contains(&destination) {
            bag.push(destination);
        }
        drop(routes);

        if filter.is_wildcard() {
            self.trie.write().insert(filter);
        }
    }

    /// Removes one occurrence of a route. If the bag becomes empty the
    /// filter entry (and any trie path) is removed entirely.
    pub fn delete_route(&self, filter: &Filter, destination: &Destination) {
        let mut routes = self.routes.write();
        let mut now_empty = false;
        if let Some(bag) = routes.get_mut(filter.as_str()) {
            bag.retain(|d| d != destination);
            now_empty = bag.is_empty();
        }
        if now_empty {
            routes.remove(filter.as_str());
        }
        drop(routes);

        if now_empty && filter.is_wildcard() {
            self.trie.write().delete(filter);
        }
    }

    #[must_use]
    pub fn lookup(&self, filter: &str) -> Vec<Destination> {
        self.routes
            .read()
            .get(filter)
            .cloned()
            .unwrap_or_default()
    }

    /// Matches a concrete topic against every filter with a live route,
    /// via the trie for wildcards and a direct lookup for the exact topic.
    #[must_use]
    pub fn matches(&self, topic: &Topic) -> Vec<Destination> {
        let routes = self.routes.read();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();

        if let Some(bag) = routes.get(topic.as_str()) {
            for d in bag {
                if seen.insert(d.clone()) {
                    out.push(d.clone());
                }
            }
        }

        if !self.trie.read().is_empty() {
            for filter in self.trie.read().matches(topic) {
                if let Some(bag) = routes.get(&filter) {
                    for d in bag {
                        if seen.insert(d.clone()) {
                            out.push(d.clone());
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_semantics_dedupe_replayed_adds() {
        let table = RouteTable::new();
        let filter = Filter::parse("a/+/c").unwrap();
        table.add_route(&filter, Destination::Node(1));
        table.add_route(&filter, Destination::Node(1));
        assert_eq!(table.lookup("a/+/c").len(), 1);
    }

    #[test]
    fn route_reference_counting_removes_last_destination() {
        let table = RouteTable::new();
        let filter = Filter::parse("a/#").unwrap();
        table.add_route(&filter, Destination::Node(1));
        table.add_route(&filter, Destination::Node(2));
        table.delete_route(&filter, &Destination::Node(1));
        assert_eq!(table.lookup("a/#"), vec![Destination::Node(2)]);
        table.delete_route(&filter, &Destination::Node(2));
        assert!(table.lookup("a/#").is_empty());
    }

    #[test]
    fn matches_via_trie_and_exact() {
        let table = RouteTable::new();
        table.add_route(
            &Filter::parse("room/+/temp").unwrap(),
            Destination::Node(7),
        );
        let topic = Topic::parse("room/1/temp").unwrap();
        assert_eq!(table.matches(&topic), vec![Destination::Node(7)]);
    }
}
