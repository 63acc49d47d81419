// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Cluster route table (spec §4.4): a replicated bag of
//! `(topic_or_filter, destination)` records, mutated only through a
//! fixed-size pool of router workers hash-partitioned by filter.

mod backoff;
mod table;
mod worker;

pub use backoff::Backoff;
pub use table::{Destination, LockMode, Route, RouteTable};
pub use worker::{RouterWorker, RouterWorkerPool};
