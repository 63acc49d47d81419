// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Broker dispatch (spec §4.5): the publish path. Matches a message against
//! the local subscription index and the cluster route table, deduplicates
//! destinations, enqueues to sessions, and applies shared-subscription
//! policy, `no_local`, and `retain_as_published`.

pub mod shared;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::collaborators::ClusterMembership;
use crate::config::SharedSubscriptionPolicy;
use crate::error::{Error, ErrorKind, Result};
use crate::index::{LocalSubscriptionIndex, RetainHandling, SubscriptionOptions};
use crate::message::{Message, MessageIdAllocator};
use crate::retained::RetainedStore;
use crate::route::{Destination, RouterWorkerPool};
use crate::session::ToSession;
use crate::topic::Filter;
use crate::types::{NodeId, SessionGid};

pub use shared::SharedGroupCursors;

/// Owns everything needed to route and fan out a publish: the local
/// subscription index, the cluster route table (via its router worker
/// pool), the retained store, and the set of locally-registered session
/// outboxes.
pub struct Broker {
    node_id: NodeId,
    local_index: RwLock<LocalSubscriptionIndex>,
    routes: Arc<RouterWorkerPool>,
    retained: Arc<RetainedStore>,
    sessions: RwLock<HashMap<SessionGid, mpsc::Sender<ToSession>>>,
    shared_cursors: SharedGroupCursors,
    shared_policy: SharedSubscriptionPolicy,
    membership: Option<Arc<dyn ClusterMembership>>,
    message_ids: MessageIdAllocator,
}

impl Broker {
    #[must_use]
    pub fn new(
        node_id: NodeId,
        routes: Arc<RouterWorkerPool>,
        retained: Arc<RetainedStore>,
        shared_policy: SharedSubscriptionPolicy,
        membership: Option<Arc<dyn ClusterMembership>>,
    ) -> Self {
        Self {
            node_id,
            local_index: RwLock::new(LocalSubscriptionIndex::new()),
            routes,
            retained,
            sessions: RwLock::new(HashMap::new()),
            shared_cursors: SharedGroupCursors::new(),
            shared_policy,
            membership,
            message_ids: MessageIdAllocator::new(),
        }
    }

    #[must_use]
    pub fn next_message_id(&self) -> u64 {
        self.message_ids.next_id()
    }

    pub fn register_session(&self, gid: SessionGid, sender: mpsc::Sender<ToSession>) {
        self.sessions.write().insert(gid, sender);
    }

    pub fn unregister_session(&self, gid: SessionGid) {
        self.sessions.write().remove(&gid);
    }

    /// Subscribes `gid` to `raw_filter` (spec §4.3). Splits a
    /// `$share/<group>/<filter>` subscription into its underlying filter
    /// and group, the way match lookups expect it. On success, returns the
    /// retained messages that must be replayed immediately, honoring
    /// `retain_handling` (spec §4.7, §8 property 9).
    pub async fn subscribe(
        &self,
        gid: SessionGid,
        raw_filter: &str,
        mut options: SubscriptionOptions,
    ) -> Result<Vec<Message>> {
        let parsed = parse_filter(raw_filter)?;
        let (key_filter, key_str) = match parsed.shared_group() {
            Some((group, rest)) => {
                options.share_group = Some(group.to_string());
                (parse_filter(rest)?, rest.to_string())
            }
            None => (parsed.clone(), raw_filter.to_string()),
        };

        let outcome = {
            let mut index = self.local_index.write();
            index.subscribe(gid, &key_str, options.clone())?
        };
        if outcome.first_local_subscriber {
            self.routes
                .add_route(key_filter.clone(), Destination::Node(self.node_id))
                .await?;
        }

        match options.retain_handling {
            RetainHandling::DoNotSend => Ok(Vec::new()),
            RetainHandling::SendIfNew if !outcome.session_subscription_is_new => Ok(Vec::new()),
            _ => Ok(self.retained.matching(&key_filter)),
        }
    }

    /// Unsubscribes `gid` from `raw_filter`, tearing down the cluster route
    /// on the last local subscriber (spec §4.3).
    pub async fn unsubscribe(&self, gid: SessionGid, raw_filter: &str) -> Result<()> {
        let key_str = Filter::parse(raw_filter)
            .ok()
            .and_then(|f| f.shared_group().map(|(_, rest)| rest.to_string()))
            .unwrap_or_else(|| raw_filter.to_string());

        let outcome = {
            let mut index = self.local_index.write();
            index.unsubscribe(gid, &key_str)
        };
        if outcome.last_local_subscriber {
            let filter = parse_filter(&key_str)?;
            self.routes
                .delete_route(filter, Destination::Node(self.node_id))
                .await?;
        }
        Ok(())
    }

    /// Removes every subscription owned by `gid`, tearing down any routes
    /// that just lost their last local subscriber (spec §4.6, §8 property
    /// 8: "killing a session removes all its routes within a bounded
    /// time").
    pub async fn remove_session(&self, gid: SessionGid) -> Result<()> {
        self.unregister_session(gid);
        let dropped_filters = self.local_index.write().remove_session(gid);
        for filter_str in dropped_filters {
            if let Ok(filter) = Filter::parse(&filter_str) {
                self.routes
                    .delete_route(filter, Destination::Node(self.node_id))
                    .await?;
            }
        }
        Ok(())
    }

    /// The publish path (spec §4.5) for a message with no identifiable
    /// local publishing session (e.g. a message forwarded in from another
    /// cluster node, or a `$SYS` broker-originated publish): `no_local` can
    /// never apply since there is no local subscriber that is also the
    /// publisher.
    pub async fn publish(&self, message: Message) -> Result<()> {
        self.publish_from(None, message).await
    }

    /// The publish path (spec §4.5): match -> deduplicate destinations ->
    /// enqueue to sessions -> apply shared-subscription policy ->
    /// `no_local` (compared against `publisher`) -> `retain_as_published`.
    ///
    /// A retain-flagged publish also updates the retained store (spec §4.7)
    /// before fanout, so a subscriber racing the publish sees it either via
    /// live delivery or via the replayed retained message, never neither.
    pub async fn publish_from(&self, publisher: Option<SessionGid>, message: Message) -> Result<()> {
        if message.flags().retain {
            self.retained.set(message.topic(), message.clone());
        }

        let destinations = self.routes.matches(message.topic());
        let is_local = destinations.iter().any(|d| d.node() == self.node_id);
        let remote_nodes: Vec<NodeId> = destinations
            .iter()
            .map(Destination::node)
            .filter(|n| *n != self.node_id)
            .collect();

        if let Some(membership) = &self.membership {
            for node in remote_nodes {
                membership
                    .forward(node, message.topic().as_str(), message.payload())
                    .await?;
            }
        }

        // An empty destination set still triggers local fanout: a
        // single-node deployment, or a test harness driving `Broker`
        // directly, may never have populated a self-route.
        if is_local || destinations.is_empty() {
            self.local_fanout(&message, publisher).await;
        }
        Ok(())
    }

    /// Local fanout (spec §4.5 step 3): groups matches by `share_group`,
    /// delivers non-shared matches to every session, and picks exactly one
    /// member per shared group. Fanout to the resolved destination set runs
    /// concurrently rather than one enqueue at a time, since a slow or
    /// backpressured session must never delay delivery to its siblings.
    async fn local_fanout(&self, message: &Message, publisher: Option<SessionGid>) {
        let matches = self.local_index.read().match_local(message.topic());

        let mut shared_groups: HashMap<String, Vec<(SessionGid, SubscriptionOptions)>> =
            HashMap::new();
        let mut targets: Vec<(SessionGid, SubscriptionOptions)> = Vec::new();

        for (gid, options) in matches {
            if options.no_local && Some(gid) == publisher {
                continue;
            }
            match options.share_group.clone() {
                Some(group) => shared_groups.entry(group).or_default().push((gid, options)),
                None => targets.push((gid, options)),
            }
        }

        for (group, members) in shared_groups {
            if members.is_empty() {
                continue;
            }
            let gids: Vec<SessionGid> = members.iter().map(|(gid, _)| *gid).collect();
            let picked = *self
                .shared_cursors
                .pick(self.shared_policy, &group, &gids, message.from());
            if let Some(entry) = members.into_iter().find(|(gid, _)| *gid == picked) {
                targets.push(entry);
            }
        }

        let deliveries = targets
            .iter()
            .map(|(gid, options)| self.deliver_one(*gid, options, message));
        futures::future::join_all(deliveries).await;
    }

    async fn deliver_one(&self, gid: SessionGid, options: &SubscriptionOptions, message: &Message) {
        let outbound = if options.retain_as_published {
            message.clone()
        } else {
            message.without_retain()
        };
        let sender = self.sessions.read().get(&gid).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(ToSession::Deliver(outbound)).await;
        }
    }
}

fn parse_filter(raw: &str) -> Result<Filter> {
    Filter::parse(raw).map_err(|err| Error::new(ErrorKind::Protocol, err.to_string()))
}
