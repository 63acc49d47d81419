// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Ordered trie over wildcard filters supporting prefix descent for match
//! queries (spec §4.2). Every terminal node carries a reference count: the
//! number of distinct routes advertising that filter. The trie only grows or
//! shrinks at the 0/1 boundary of that count; intermediate `insert`/`delete`
//! calls for an already-live filter are no-ops on the tree shape.

use ahash::RandomState;
use std::collections::HashMap;

use crate::topic::{Filter, Level, Topic};

type Map<K, V> = HashMap<K, V, RandomState>;

#[derive(Debug, Default)]
struct Node {
    children: Map<String, Node>,
    plus: Option<Box<Node>>,
    hash: Option<Box<Node>>,
    /// Number of live routes for the filter that terminates at this node,
    /// `None` if this node is not itself a terminal.
    refcount: Option<u32>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: Map::default(),
            plus: None,
            hash: None,
            refcount: None,
        }
    }
}

/// Mutable trie of subscription filters. Not internally synchronized: the
/// concurrency discipline in spec §5 puts exactly one router worker in
/// charge of mutating a given shard's trie at a time.
#[derive(Debug, Default)]
pub struct Trie {
    root: Node,
    live_filter_count: usize,
}

impl Trie {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            live_filter_count: 0,
        }
    }

    /// Fast path for dispatch: true when no wildcard route exists at all, so
    /// callers can skip the trie walk entirely.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_filter_count == 0
    }

    /// Increments the filter's reference count, materializing the path on
    /// first insert. Returns true iff this was the transition from 0 to 1
    /// live routes (the caller uses this to decide whether a new cluster
    /// route needs to be created).
    pub fn insert(&mut self, filter: &Filter) -> bool {
        let mut node = &mut self.root;
        for level in filter.levels() {
            node = match level {
                Level::SingleWildcard => node.plus.get_or_insert_with(|| Box::new(Node::new())),
                Level::MultiWildcard => node.hash.get_or_insert_with(|| Box::new(Node::new())),
                Level::Literal(s) => node
                    .children
                    .entry(s.clone())
                    .or_insert_with(Node::new),
            };
        }
        let became_live = node.refcount.is_none();
        *node.refcount.get_or_insert(0) += 1;
        if became_live {
            self.live_filter_count += 1;
        }
        became_live
    }

    /// Decrements the filter's reference count, pruning the path back to the
    /// nearest branching or terminal ancestor once it reaches zero. Returns
    /// true iff this was the transition from 1 to 0 live routes.
    pub fn delete(&mut self, filter: &Filter) -> bool {
        let went_dead = Self::delete_at(&mut self.root, filter.levels()).unwrap_or(false);
        if went_dead {
            self.live_filter_count -= 1;
        }
        went_dead
    }

    /// Returns `Some(true)` if the filter's refcount dropped to zero at this
    /// call, `Some(false)` if it merely decremented, `None` if the filter was
    /// not present (caller's bookkeeping is out of sync with the trie).
    fn delete_at(node: &mut Node, levels: &[Level]) -> Option<bool> {
        let Some((head, rest)) = levels.split_first() else {
            let count = node.refcount.as_mut()?;
            *count -= 1;
            let went_dead = *count == 0;
            if went_dead {
                node.refcount = None;
            }
            return Some(went_dead);
        };

        let (child_present, went_dead, child_now_empty) = match head {
            Level::SingleWildcard => {
                let Some(child) = node.plus.as_deref_mut() else {
                    return None;
                };
                let went_dead = Self::delete_at(child, rest)?;
                let empty = Self::is_leaf_dead(child);
                (true, went_dead, empty)
            }
            Level::MultiWildcard => {
                let Some(child) = node.hash.as_deref_mut() else {
                    return None;
                };
                let went_dead = Self::delete_at(child, rest)?;
                let empty = Self::is_leaf_dead(child);
                (true, went_dead, empty)
            }
            Level::Literal(s) => {
                let Some(child) = node.children.get_mut(s) else {
                    return None;
                };
                let went_dead = Self::delete_at(child, rest)?;
                let empty = Self::is_leaf_dead(child);
                (true, went_dead, empty)
            }
        };
        debug_assert!(child_present);

        if child_now_empty {
            match head {
                Level::SingleWildcard => node.plus = None,
                Level::MultiWildcard => node.hash = None,
                Level::Literal(s) => {
                    node.children.remove(s);
                }
            }
        }
        Some(went_dead)
    }

    fn is_leaf_dead(node: &Node) -> bool {
        node.refcount.is_none()
            && node.children.is_empty()
            && node.plus.is_none()
            && node.hash.is_none()
    }

    /// Descends the trie for `topic`, visiting at each level the exact-label
    /// child, the `+` child, and the `#` child. A `#` child's terminal always
    /// matches and ends descent on that branch; `+` and exact continue.
    /// Ordering of the returned filters is unspecified; duplicate filters
    /// cannot occur since the trie stores each filter at exactly one path.
    #[must_use]
    pub fn matches(&self, topic: &Topic) -> Vec<String> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let is_system = topic.is_system();
        Self::walk(&self.root, topic.levels(), String::new(), is_system, true, &mut out);
        out
    }

    fn walk(
        node: &Node,
        remaining: &[String],
        path: String,
        topic_is_system: bool,
        at_root: bool,
        out: &mut Vec<String>,
    ) {
        match remaining.split_first() {
            None => {
                if let Some(hash_child) = node.hash.as_deref() {
                    if hash_child.refcount.is_some() {
                        out.push(join(&path, "#"));
                    }
                }
                if node.refcount.is_some() {
                    out.push(path);
                }
            }
            Some((head, rest)) => {
                if let Some(child) = node.children.get(head) {
                    let next_path = join(&path, head);
                    Self::walk(child, rest, next_path, topic_is_system, false, out);
                }
                if !(at_root && topic_is_system) {
                    if let Some(child) = node.plus.as_deref() {
                        let next_path = join(&path, "+");
                        Self::walk(child, rest, next_path, topic_is_system, false, out);
                    }
                    if let Some(child) = node.hash.as_deref() {
                        if child.refcount.is_some() {
                            out.push(join(&path, "#"));
                        }
                    }
                }
            }
        }
    }
}

fn join(path: &str, level: &str) -> String {
    if path.is_empty() {
        level.to_string()
    } else {
        format!("{path}/{level}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }
    fn f(s: &str) -> Filter {
        Filter::parse(s).unwrap()
    }

    #[test]
    fn insert_reports_zero_to_one_transition() {
        let mut trie = Trie::new();
        assert!(trie.insert(&f("a/+/c")));
        assert!(!trie.insert(&f("a/+/c")));
    }

    #[test]
    fn matches_exact_wildcard_paths() {
        let mut trie = Trie::new();
        trie.insert(&f("a/+/c"));
        trie.insert(&f("a/#"));
        let mut got = trie.matches(&t("a/b/c"));
        got.sort();
        assert_eq!(got, vec!["a/#".to_string(), "a/+/c".to_string()]);
    }

    #[test]
    fn dollar_topics_never_match_rooted_wildcards() {
        let mut trie = Trie::new();
        trie.insert(&f("#"));
        trie.insert(&f("+/x"));
        assert!(trie.matches(&t("$SYS/brokers/1/uptime")).is_empty());
    }

    #[test]
    fn delete_prunes_back_to_branch_point() {
        let mut trie = Trie::new();
        trie.insert(&f("a/b/c"));
        trie.insert(&f("a/b/d"));
        assert!(trie.delete(&f("a/b/c")));
        assert!(trie.matches(&t("a/b/d")) == vec!["a/b/d".to_string()]);
        assert!(trie.delete(&f("a/b/d")));
        assert!(trie.is_empty());
    }

    #[test]
    fn trie_equivalence_against_brute_force() {
        let filters = ["a/+/c", "a/#", "x/y/z", "+/+/+", "$SYS/#"];
        let mut trie = Trie::new();
        for flt in &filters {
            trie.insert(&f(flt));
        }
        for topic in ["a/b/c", "a/z", "x/y/z", "p/q/r", "$SYS/uptime"] {
            let topic = t(topic);
            let mut expect: Vec<String> = filters
                .iter()
                .filter(|flt| f(flt).matches(&topic))
                .map(|s| (*s).to_string())
                .collect();
            let mut got = trie.matches(&topic);
            expect.sort();
            got.sort();
            assert_eq!(expect, got, "mismatch for topic {}", topic.as_str());
        }
    }
}
