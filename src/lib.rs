// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Message routing and dispatch core for a clustered MQTT broker.
//!
//! This crate implements the subscription index, the cluster route table,
//! the wildcard trie, the broker dispatch path, and the per-session state
//! machine described in the routing core specification. Transport
//! listeners, the wire codec, pluggable auth/ACL backends, the admin
//! surface, and telemetry sinks are external collaborators reached only
//! through [`wire`] and [`collaborators`].

pub mod acl;
pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod index;
pub mod message;
pub mod retained;
pub mod route;
pub mod session;
pub mod topic;
pub mod trie;
pub mod types;
pub mod wire;

pub use error::{Error, ErrorKind, Result};
