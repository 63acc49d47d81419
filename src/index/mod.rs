// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Local subscription index (spec §4.3): maps topic/filter to the set of
//! local session handles subscribed to it, backed by a hash map for exact
//! filters and the wildcard trie for filters that need prefix descent.

use std::collections::{HashMap, HashSet};

use crate::topic::{Filter, Topic, TopicError};
use crate::trie::Trie;
use crate::types::SessionGid;

/// Per-subscription options (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionOptions {
    pub qos: u8,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
    pub subscription_identifier: Option<u32>,
    pub share_group: Option<String>,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            qos: 0,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::Send,
            subscription_identifier: None,
            share_group: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainHandling {
    Send,
    SendIfNew,
    DoNotSend,
}

/// Outcome of a `subscribe` call: whether this is the first local subscriber
/// to `filter`, i.e. whether the caller must stand up a cluster route, and
/// whether this particular session's subscription to `filter` is new (as
/// opposed to a re-subscribe that only changed options), which governs
/// `RetainHandling::SendIfNew` (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub first_local_subscriber: bool,
    pub session_subscription_is_new: bool,
}

/// Outcome of an `unsubscribe` call: whether this was the last local
/// subscriber to `filter`, i.e. whether the caller must tear down the
/// cluster route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    pub last_local_subscriber: bool,
}

#[derive(Debug, Default)]
pub struct LocalSubscriptionIndex {
    /// filter string -> (session, options)
    subscribers: HashMap<String, HashMap<SessionGid, SubscriptionOptions>>,
    trie: Trie,
}

impl LocalSubscriptionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `filter`, records the subscription, and reports whether a
    /// cluster route must now be created (spec §4.3: "if this is the first
    /// local subscriber to `filter`, create a cluster route").
    pub fn subscribe(
        &mut self,
        session: SessionGid,
        filter: &str,
        options: SubscriptionOptions,
    ) -> Result<SubscribeOutcome, TopicError> {
        let parsed = Filter::parse(filter)?;
        let is_new_filter = !self.subscribers.contains_key(parsed.as_str());
        let session_subscription_is_new = self
            .subscribers
            .entry(parsed.as_str().to_string())
            .or_default()
            .insert(session, options)
            .is_none();

        if is_new_filter && parsed.is_wildcard() {
            let became_live = self.trie.insert(&parsed);
            debug_assert!(became_live, "filter absent from hash map but live in trie");
        }
        Ok(SubscribeOutcome {
            first_local_subscriber: is_new_filter,
            session_subscription_is_new,
        })
    }

    /// Removes the subscription, reporting whether the cluster route for
    /// `filter` must now be torn down.
    pub fn unsubscribe(&mut self, session: SessionGid, filter: &str) -> UnsubscribeOutcome {
        let Some(set) = self.subscribers.get_mut(filter) else {
            return UnsubscribeOutcome {
                last_local_subscriber: false,
            };
        };
        set.remove(&session);
        if !set.is_empty() {
            return UnsubscribeOutcome {
                last_local_subscriber: false,
            };
        }
        self.subscribers.remove(filter);

        let mut last_local_subscriber = true;
        if let Ok(parsed) = Filter::parse(filter) {
            if parsed.is_wildcard() {
                last_local_subscriber = self.trie.delete(&parsed);
            }
        }
        UnsubscribeOutcome {
            last_local_subscriber,
        }
    }

    /// Removes every subscription owned by `session`, used when a session
    /// dies (spec §4.6/§8 property 8: route cleanup on session death).
    /// Returns the filters whose last local subscriber was just removed.
    pub fn remove_session(&mut self, session: SessionGid) -> Vec<String> {
        let filters: Vec<String> = self
            .subscribers
            .iter()
            .filter(|(_, subs)| subs.contains_key(&session))
            .map(|(filter, _)| filter.clone())
            .collect();

        let mut dropped_routes = Vec::new();
        for filter in filters {
            let outcome = self.unsubscribe(session, &filter);
            if outcome.last_local_subscriber {
                dropped_routes.push(filter);
            }
        }
        dropped_routes
    }

    /// Union of the exact lookup for `topic` and the trie's wildcard
    /// matches, de-duplicated by session.
    #[must_use]
    pub fn match_local(&self, topic: &Topic) -> Vec<(SessionGid, SubscriptionOptions)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        if let Some(exact) = self.subscribers.get(topic.as_str()) {
            for (gid, opts) in exact {
                if seen.insert(*gid) {
                    out.push((*gid, opts.clone()));
                }
            }
        }

        for filter in self.trie.matches(topic) {
            if let Some(subs) = self.subscribers.get(&filter) {
                for (gid, opts) in subs {
                    if seen.insert(*gid) {
                        out.push((*gid, opts.clone()));
                    }
                }
            }
        }
        out
    }

    #[must_use]
    pub fn subscriber_count(&self, filter: &str) -> usize {
        self.subscribers.get(filter).map_or(0, HashMap::len)
    }
}
