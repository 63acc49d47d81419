// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Router workers (spec §4.4): a fixed-size pool of tasks that serialize
//! route mutations by `hash(filter) mod pool_size`, so concurrent
//! add/delete of the same filter can never race, while different filters
//! mutate independently shards in parallel.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use std::collections::hash_map::DefaultHasher;

use tokio::sync::{mpsc, oneshot};

use super::backoff::Backoff;
use super::table::{Destination, LockMode, RouteTable};
use crate::collaborators::TransactionalKv;
use crate::error::{Error, ErrorKind, Result};
use crate::topic::{Filter, Topic};

const MAX_RETRY_ATTEMPTS: u32 = 5;
const RETRY_BASE: Duration = Duration::from_millis(5);
const RETRY_CAP: Duration = Duration::from_millis(200);

enum RouteMutation {
    Add(Filter, Destination, oneshot::Sender<Result<()>>),
    Delete(Filter, Destination, oneshot::Sender<Result<()>>),
}

fn shard_for(filter: &str, pool_size: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    filter.hash(&mut hasher);
    (hasher.finish() as usize) % pool_size
}

/// A single router worker: owns one route-table shard exclusively and
/// drains its mutation queue sequentially.
pub struct RouterWorker {
    id: usize,
    table: Arc<RouteTable>,
    receiver: mpsc::Receiver<RouteMutation>,
    lock_mode: LockMode,
    kv: Option<Arc<dyn TransactionalKv>>,
}

impl RouterWorker {
    fn new(
        id: usize,
        table: Arc<RouteTable>,
        receiver: mpsc::Receiver<RouteMutation>,
        lock_mode: LockMode,
        kv: Option<Arc<dyn TransactionalKv>>,
    ) -> Self {
        Self {
            id,
            table,
            receiver,
            lock_mode,
            kv,
        }
    }

    pub async fn run_loop(mut self) {
        while let Some(mutation) = self.receiver.recv().await {
            match mutation {
                RouteMutation::Add(filter, dest, reply) => {
                    let result = self.commit(&filter, &dest, true).await;
                    let _ = reply.send(result);
                }
                RouteMutation::Delete(filter, dest, reply) => {
                    let result = self.commit(&filter, &dest, false).await;
                    let _ = reply.send(result);
                }
            }
        }
        log::info!("router worker {} shut down, queue closed", self.id);
    }

    /// Applies one mutation, retrying through the transactional KV
    /// collaborator (if configured) with bounded backoff. Under `global`
    /// lock mode, a wildcard filter's trie update is additionally guarded
    /// by the KV's cluster-wide advisory lock per spec §4.4; per the open
    /// question in spec §9 this implementation always takes the
    /// transactional path, never a "dirty" unlocked delete.
    async fn commit(&self, filter: &Filter, dest: &Destination, add: bool) -> Result<()> {
        let needs_global_lock = self.lock_mode == LockMode::Global && filter.is_wildcard();

        if let Some(kv) = &self.kv {
            let mut backoff = Backoff::new(MAX_RETRY_ATTEMPTS, RETRY_BASE, RETRY_CAP);
            loop {
                let attempt = if add {
                    kv.commit_add(filter.as_str(), dest, needs_global_lock).await
                } else {
                    kv.commit_delete(filter.as_str(), dest, needs_global_lock).await
                };
                match attempt {
                    Ok(()) => break,
                    Err(_conflict) => match backoff.next_delay() {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => {
                            return Err(Error::route_unavailable(
                                filter.as_str(),
                                backoff.attempts_made(),
                            ))
                        }
                    },
                }
            }
        }

        if add {
            self.table.add_route(filter, dest.clone());
        } else {
            self.table.delete_route(filter, dest);
        }
        Ok(())
    }
}

/// Owns the full shard set and the per-shard senders; the public handle
/// dispatch and the local subscription layer talk to.
pub struct RouterWorkerPool {
    shards: Vec<Arc<RouteTable>>,
    mutation_senders: Vec<mpsc::Sender<RouteMutation>>,
}

impl std::fmt::Debug for RouterWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterWorkerPool")
            .field("pool_size", &self.shards.len())
            .finish()
    }
}

impl RouterWorkerPool {
    /// Spawns `pool_size` router worker tasks, each owning one shard of the
    /// route table.
    #[must_use]
    pub fn spawn(
        pool_size: usize,
        lock_mode: LockMode,
        kv: Option<Arc<dyn TransactionalKv>>,
    ) -> Self {
        assert!(pool_size > 0, "routing.worker_pool_size must be positive");
        let mut shards = Vec::with_capacity(pool_size);
        let mut mutation_senders = Vec::with_capacity(pool_size);
        for id in 0..pool_size {
            let table = Arc::new(RouteTable::new());
            let (tx, rx) = mpsc::channel(1024);
            let worker = RouterWorker::new(id, Arc::clone(&table), rx, lock_mode, kv.clone());
            tokio::spawn(worker.run_loop());
            shards.push(table);
            mutation_senders.push(tx);
        }
        Self {
            shards,
            mutation_senders,
        }
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.shards.len()
    }

    pub async fn add_route(&self, filter: Filter, destination: Destination) -> Result<()> {
        let shard = shard_for(filter.as_str(), self.mutation_senders.len());
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mutation_senders[shard]
            .send(RouteMutation::Add(filter, destination, reply_tx))
            .await
            .map_err(|_| Error::new(ErrorKind::Channel, "router worker queue closed"))?;
        reply_rx
            .await
            .map_err(|_| Error::new(ErrorKind::Channel, "router worker dropped reply"))?
    }

    pub async fn delete_route(&self, filter: Filter, destination: Destination) -> Result<()> {
        let shard = shard_for(filter.as_str(), self.mutation_senders.len());
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mutation_senders[shard]
            .send(RouteMutation::Delete(filter, destination, reply_tx))
            .await
            .map_err(|_| Error::new(ErrorKind::Channel, "router worker queue closed"))?;
        reply_rx
            .await
            .map_err(|_| Error::new(ErrorKind::Channel, "router worker dropped reply"))?
    }

    #[must_use]
    pub fn lookup(&self, filter: &str) -> Vec<Destination> {
        let shard = shard_for(filter, self.shards.len());
        self.shards[shard].lookup(filter)
    }

    /// Merges matches across every shard: an arbitrary topic's matching
    /// wildcard filters may live in any shard, so every shard's trie is
    /// consulted and the destination bag de-duplicated.
    #[must_use]
    pub fn matches(&self, topic: &Topic) -> Vec<Destination> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for shard in &self.shards {
            for dest in shard.matches(topic) {
                if seen.insert(dest.clone()) {
                    out.push(dest);
                }
            }
        }
        out
    }
}
