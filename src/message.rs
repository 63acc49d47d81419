// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The immutable message record that flows through matching and dispatch
//! (spec §3). Once constructed a `Message` is never mutated in place; the
//! dispatch path clones it (cheaply, via `Arc` payload) and adjusts only the
//! per-recipient view (the retain flag per `retain_as_published`).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::topic::Topic;

/// Quality of service, spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl Qos {
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AtMostOnce),
            1 => Some(Self::AtLeastOnce),
            2 => Some(Self::ExactlyOnce),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }

    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if (self as u8) <= (other as u8) {
            self
        } else {
            other
        }
    }
}

/// Headers carried alongside a message that the core itself does not
/// interpret but must preserve and forward (spec §3).
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    pub username: Option<String>,
    pub peer_host: Option<String>,
    pub protocol_version: u8,
    pub message_expiry_interval: Option<u32>,
}

/// Flags carried alongside the payload (spec §3): `dup`, `retain`, and the
/// `sys` marker for broker-originated traffic (e.g. `$SYS` publishes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFlags {
    pub dup: bool,
    pub retain: bool,
    pub sys: bool,
}

/// An immutable published message (spec §3). `id` is a monotonically
/// increasing counter minted by the broker at ingress; it has no relation to
/// the MQTT packet id, which is per-session and reused.
#[derive(Debug, Clone)]
pub struct Message {
    id: u64,
    from: String,
    qos: Qos,
    flags: MessageFlags,
    headers: MessageHeaders,
    topic: Topic,
    payload: Arc<[u8]>,
    timestamp: u64,
}

impl Message {
    #[must_use]
    pub fn new(
        id: u64,
        from: impl Into<String>,
        qos: Qos,
        topic: Topic,
        payload: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            id,
            from: from.into(),
            qos,
            flags: MessageFlags::default(),
            headers: MessageHeaders::default(),
            topic,
            payload: payload.into(),
            timestamp: now_millis(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub const fn qos(&self) -> Qos {
        self.qos
    }

    #[must_use]
    pub const fn flags(&self) -> MessageFlags {
        self.flags
    }

    #[must_use]
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: MessageHeaders) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub const fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    #[must_use]
    pub const fn topic(&self) -> &Topic {
        &self.topic
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub const fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[must_use]
    pub const fn is_sys(&self) -> bool {
        self.flags.sys
    }

    /// Returns a copy with `retain` cleared, used when a non-shared
    /// subscriber's `retain_as_published` option is false (spec §4.5).
    #[must_use]
    pub fn without_retain(&self) -> Self {
        let mut flags = self.flags;
        flags.retain = false;
        Self {
            flags,
            ..self.clone()
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Monotonic message id allocator, one per broker process.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    next: std::sync::atomic::AtomicU64,
}

impl MessageIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_is_monotonic() {
        let alloc = MessageIdAllocator::new();
        let a = alloc.next_id();
        let b = alloc.next_id();
        assert!(b > a);
    }

    #[test]
    fn qos_min_picks_lower() {
        assert_eq!(Qos::AtLeastOnce.min(Qos::ExactlyOnce), Qos::AtLeastOnce);
        assert_eq!(Qos::AtMostOnce.min(Qos::ExactlyOnce), Qos::AtMostOnce);
    }

    #[test]
    fn without_retain_clears_only_retain() {
        let topic = Topic::parse("a/b").unwrap();
        let msg = Message::new(1, "client", Qos::AtMostOnce, topic, b"x".to_vec())
            .with_flags(MessageFlags {
                dup: true,
                retain: true,
                sys: false,
            });
        let cleared = msg.without_retain();
        assert!(!cleared.flags().retain);
        assert!(cleared.flags().dup);
    }
}
