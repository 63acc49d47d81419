// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Capability interfaces for the pluggable collaborators named in spec §6
//! and designed as "dynamic dispatch over pluggable backends" in spec §9:
//! cluster membership, the transactional KV behind the route table, and
//! authentication/authorization backends. The core depends only on these
//! traits and never imports a backend-specific symbol (no MySQL, LDAP, or
//! HTTP types appear anywhere in this crate).

use async_trait::async_trait;

use crate::error::Result;
use crate::route::Destination;
use crate::types::NodeId;

/// Membership events the core reacts to: a route-owning node leaving means
/// its routes must be reconciled (spec §5: "the registry reaps orphaned
/// routes via heartbeat").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined(NodeId),
    Left(NodeId),
}

/// Cluster membership collaborator (spec §6): join/leave/list/subscribe.
/// The core assumes a monotonic membership view per node and at-least-once
/// delivery of membership events.
#[async_trait]
pub trait ClusterMembership: Send + Sync {
    fn local_node(&self) -> NodeId;
    fn members(&self) -> Vec<NodeId>;

    /// Forwards a matched message once to `node`'s broker for local fanout.
    async fn forward(&self, node: NodeId, topic: &str, payload: &[u8]) -> Result<()>;
}

/// A conflict signalled by the transactional KV backing the route table;
/// the router worker retries through `Backoff` on this before surfacing
/// `RouteUnavailable` (spec §4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionConflict;

/// The transactional KV collaborator behind the cluster route table
/// (spec §4.4, §6): "multi-key atomic transactions on a single shard,
/// eventual consistency across cluster members with bounded replication
/// lag, and failover promotion when a member leaves". `needs_global_lock`
/// is set by the router worker when `routing.lock_mode = global` and the
/// filter is a wildcard (spec §4.4's `global` mode).
#[async_trait]
pub trait TransactionalKv: Send + Sync {
    async fn commit_add(
        &self,
        filter: &str,
        destination: &Destination,
        needs_global_lock: bool,
    ) -> std::result::Result<(), TransactionConflict>;

    async fn commit_delete(
        &self,
        filter: &str,
        destination: &Destination,
        needs_global_lock: bool,
    ) -> std::result::Result<(), TransactionConflict>;
}

/// Outcome of an authentication attempt (spec §6: reason codes surfaced
/// from auth/ACL failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Deny,
}

/// An ACL action a session may attempt against a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AclAction {
    Publish,
    Subscribe,
}

/// Capability interface for pluggable auth/ACL backends (spec §9): MySQL,
/// PostgreSQL, LDAP, HTTP, and built-in file-based backends all implement
/// this; the core never imports their concrete types.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(
        &self,
        client_id: &str,
        username: Option<&str>,
        password: Option<&[u8]>,
    ) -> Result<AuthDecision>;

    async fn authorize(&self, client_id: &str, action: AclAction, topic: &str) -> Result<AuthDecision>;

    async fn on_start(&self) -> Result<()> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<()> {
        Ok(())
    }

    async fn on_health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn on_query(&self, _query: &str) -> Result<String> {
        Ok(String::new())
    }
}
