// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt::{self, Display};
use std::io;

use tokio::sync::mpsc;

use crate::types::SessionId;

/// Broad classification of the error taxonomy described for the routing core:
/// protocol, authorization, routing, resource exhaustion and internal
/// invariant violations each map to one kind here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed packet or disallowed packet in the current session state.
    Protocol,

    /// Auth/ACL deny, surfaced as a reason code rather than a crash.
    Authorization,

    /// KV transaction conflict, retry exhaustion, or an unreachable route peer.
    Routing,

    /// Queue overflow, inflight window full, or other backpressure condition.
    ResourceExhausted,

    /// An invariant the core assumes was violated; fatal to the owning task only.
    Internal,

    /// Config file missing, malformed, or failed `validate()`.
    Config,

    /// Wrapped `std::io::Error`.
    Io,

    /// A channel to a peer task closed or failed to send.
    Channel,
}

#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[must_use]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::new(
            ErrorKind::Internal,
            format!("session {session_id} not found in registry"),
        )
    }

    #[must_use]
    pub fn route_unavailable(filter: &str, retries: u32) -> Self {
        Self::new(
            ErrorKind::Routing,
            format!("route transaction for {filter:?} failed after {retries} retries"),
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("io error: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Config, format!("invalid config: {err}"))
    }
}

impl From<crate::topic::TopicError> for Error {
    fn from(err: crate::topic::TopicError) -> Self {
        Self::new(ErrorKind::Protocol, format!("invalid topic filter: {err}"))
    }
}

impl<T> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Self::new(ErrorKind::Channel, format!("channel send failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
