// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Retained message store (spec §4.7): the last retained message for each
//! concrete topic, served to new matching subscribers per their
//! `retain_handling` option. Enumeration on subscribe uses the wildcard
//! trie only if the filter is a wildcard; an exact filter is a direct
//! lookup.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::message::Message;
use crate::topic::{Filter, Topic};

/// Single-writer-per-topic store (spec §5: "single-writer-per-topic via a
/// hashed worker; reuse the router worker pool is acceptable"). The store
/// itself is internally synchronized with a read-write lock so it can be
/// shared across router worker shards without requiring callers to funnel
/// every read through a worker task.
#[derive(Debug, Default)]
pub struct RetainedStore {
    by_topic: RwLock<HashMap<String, Message>>,
}

impl RetainedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the most recent retained message for a concrete topic.
    #[must_use]
    pub fn get(&self, topic: &Topic) -> Option<Message> {
        self.by_topic.read().get(topic.as_str()).cloned()
    }

    /// Sets (or, on empty payload, deletes) the retained message for a
    /// topic (spec §3, §4.7).
    pub fn set(&self, topic: &Topic, message: Message) {
        let empty_payload = message.payload().is_empty();
        let mut by_topic = self.by_topic.write();
        if empty_payload {
            by_topic.remove(topic.as_str());
        } else {
            by_topic.insert(topic.as_str().to_string(), message);
        }
    }

    /// Enumerates every retained message whose topic matches `filter`
    /// (spec §4.7): an exact filter is a direct lookup; a wildcard filter
    /// scans the (typically small) retained set rather than descending a
    /// trie keyed the wrong direction for this query shape.
    #[must_use]
    pub fn matching(&self, filter: &Filter) -> Vec<Message> {
        let by_topic = self.by_topic.read();
        if !filter.is_wildcard() {
            return by_topic
                .get(filter.as_str())
                .cloned()
                .into_iter()
                .collect();
        }

        by_topic
            .iter()
            .filter_map(|(topic_str, message)| {
                let topic = Topic::parse(topic_str).ok()?;
                filter.matches(&topic).then(|| message.clone())
            })
            .collect()
    }
}
