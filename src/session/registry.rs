// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Tracks which `SessionGid` currently owns each client id, enforcing the
//! "at most one connected session per client-id cluster-wide" invariant
//! (spec §3) by displacing the previous owner on takeover (spec §8 property
//! S6).

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::session::commands::ToSession;
use crate::types::SessionGid;

/// Outcome of registering a new connection under a client id.
#[derive(Debug)]
pub enum RegisterOutcome {
    /// No prior session existed; this is a fresh connection.
    Fresh,
    /// A prior session existed and was just displaced; `session_present`
    /// should be reported true to the new connection if it resumes
    /// existing subscription/inflight state (decided by the caller).
    Displaced { previous: SessionGid },
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_client_id: RwLock<HashMap<String, (SessionGid, mpsc::Sender<ToSession>)>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `gid` as the connected session for `client_id`. If a
    /// session was already registered for this client id, a
    /// `ToSession::Takeover` is sent to it and it is evicted from the map
    /// (spec §4.6: "the prior owner is sent a `session_takeover`
    /// shutdown cause").
    pub async fn register(
        &self,
        client_id: &str,
        gid: SessionGid,
        sender: mpsc::Sender<ToSession>,
    ) -> RegisterOutcome {
        let previous = {
            let mut map = self.by_client_id.write();
            map.insert(client_id.to_string(), (gid, sender))
        };
        match previous {
            None => RegisterOutcome::Fresh,
            Some((previous_gid, previous_sender)) => {
                let _ = previous_sender.send(ToSession::Takeover).await;
                RegisterOutcome::Displaced {
                    previous: previous_gid,
                }
            }
        }
    }

    /// Removes the registration for `client_id` iff it still points at
    /// `gid` (a session that was already displaced must not evict its
    /// successor's entry when it finishes tearing down).
    pub fn unregister(&self, client_id: &str, gid: SessionGid) {
        let mut map = self.by_client_id.write();
        if let Some((current, _)) = map.get(client_id) {
            if *current == gid {
                map.remove(client_id);
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, client_id: &str) -> Option<SessionGid> {
        self.by_client_id.read().get(client_id).map(|(gid, _)| *gid)
    }

    #[must_use]
    pub fn sender_for(&self, client_id: &str) -> Option<mpsc::Sender<ToSession>> {
        self.by_client_id
            .read()
            .get(client_id)
            .map(|(_, sender)| sender.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gid(n: u64) -> SessionGid {
        SessionGid::new(0, n)
    }

    #[tokio::test]
    async fn second_connect_displaces_first() {
        let registry = SessionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        let outcome = registry.register("c1", gid(1), tx1).await;
        assert!(matches!(outcome, RegisterOutcome::Fresh));

        let outcome = registry.register("c1", gid(2), tx2).await;
        assert!(matches!(outcome, RegisterOutcome::Displaced { previous } if previous == gid(1)));

        assert!(matches!(rx1.recv().await, Some(ToSession::Takeover)));
        assert_eq!(registry.lookup("c1"), Some(gid(2)));
    }

    #[tokio::test]
    async fn stale_unregister_does_not_evict_successor() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        registry.register("c1", gid(1), tx1).await;
        registry.register("c1", gid(2), tx2).await;

        registry.unregister("c1", gid(1));
        assert_eq!(registry.lookup("c1"), Some(gid(2)));
    }
}
