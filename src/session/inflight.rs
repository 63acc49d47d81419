// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Packet-id allocation and the inflight QoS 1/2 window (spec §4.6): bounded
//! by `receive_maximum` (inbound, from the client) and `send_quota`
//! (outbound, to the client). Retransmission of an unacked inflight entry
//! on reconnect reuses the same packet id when the session is resumed.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::message::Message;
use crate::types::PacketId;

const MIN_PACKET_ID: PacketId = 1;
const MAX_PACKET_ID: PacketId = 65535;

/// One entry held in the outbound inflight window: a QoS 1/2 message sent
/// to the client but not yet fully acknowledged.
#[derive(Debug, Clone)]
pub struct InflightEntry {
    pub message: Message,
    pub sent_at: Instant,
    pub retry_count: u32,
}

/// Monotone allocator over `[1, 65535]`, skipping ids currently held in the
/// inflight map (spec §4.6).
#[derive(Debug)]
pub struct PacketIdAllocator {
    next: PacketId,
}

impl Default for PacketIdAllocator {
    fn default() -> Self {
        Self { next: MIN_PACKET_ID }
    }
}

impl PacketIdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next id not present in `inflight`, wrapping at
    /// `65535` back to `1`. Returns `None` if every id is in use, which
    /// only happens when the inflight window is misconfigured to exceed
    /// 65535 entries.
    pub fn allocate(&mut self, inflight: &BTreeMap<PacketId, InflightEntry>) -> Option<PacketId> {
        if inflight.len() as u32 >= u32::from(MAX_PACKET_ID) {
            return None;
        }
        loop {
            let candidate = self.next;
            self.next = if self.next == MAX_PACKET_ID {
                MIN_PACKET_ID
            } else {
                self.next + 1
            };
            if !inflight.contains_key(&candidate) {
                return Some(candidate);
            }
        }
    }
}

/// Bounded outbound inflight window for one session (spec §4.6). QoS 1
/// holds an entry until PUBACK; QoS 2 follows PUBREC/PUBREL/PUBCOMP — the
/// caller drives that sub-state machine and only uses this map to track
/// "has this packet id been fully acknowledged yet".
#[derive(Debug, Default)]
pub struct InflightWindow {
    capacity: usize,
    entries: BTreeMap<PacketId, InflightEntry>,
    allocator: PacketIdAllocator,
}

impl InflightWindow {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: BTreeMap::new(),
            allocator: PacketIdAllocator::new(),
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admits `message` into the window under a freshly allocated packet
    /// id, or `None` if the window is full (caller treats this as
    /// backpressure, per spec §4.6).
    pub fn push(&mut self, message: Message) -> Option<PacketId> {
        if self.is_full() {
            return None;
        }
        let packet_id = self.allocator.allocate(&self.entries)?;
        self.entries.insert(
            packet_id,
            InflightEntry {
                message,
                sent_at: Instant::now(),
                retry_count: 0,
            },
        );
        Some(packet_id)
    }

    /// Re-admits a message at a specific packet id, used when resuming a
    /// session across reconnect so retransmission reuses the original id
    /// (spec §4.6, §8 property 7).
    pub fn restore(&mut self, packet_id: PacketId, message: Message, retry_count: u32) {
        self.entries.insert(
            packet_id,
            InflightEntry {
                message,
                sent_at: Instant::now(),
                retry_count,
            },
        );
    }

    /// Acknowledges and removes an entry (PUBACK for QoS 1, PUBCOMP for
    /// QoS 2). Returns the entry if one existed.
    pub fn ack(&mut self, packet_id: PacketId) -> Option<InflightEntry> {
        self.entries.remove(&packet_id)
    }

    #[must_use]
    pub fn get(&self, packet_id: PacketId) -> Option<&InflightEntry> {
        self.entries.get(&packet_id)
    }

    /// Marks an entry as retransmitted (bumps `retry_count`, resets
    /// `sent_at`), returning the new retry count, or `None` if absent.
    pub fn mark_retried(&mut self, packet_id: PacketId) -> Option<u32> {
        let entry = self.entries.get_mut(&packet_id)?;
        entry.retry_count += 1;
        entry.sent_at = Instant::now();
        Some(entry.retry_count)
    }

    /// Every entry whose `sent_at` predates `deadline`, for the retry timer
    /// to scan (spec §8 property 6: "after <= retry_max retransmissions, an
    /// unacked inflight results in disconnect").
    #[must_use]
    pub fn overdue(&self, deadline: Instant) -> Vec<PacketId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.sent_at < deadline)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn drain(&mut self) -> Vec<(PacketId, InflightEntry)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Qos;
    use crate::topic::Topic;

    fn msg() -> Message {
        Message::new(1, "c", Qos::AtLeastOnce, Topic::parse("a/b").unwrap(), b"x".to_vec())
    }

    #[test]
    fn push_allocates_distinct_ids() {
        let mut window = InflightWindow::new(4);
        let a = window.push(msg()).unwrap();
        let b = window.push(msg()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn full_window_rejects_push() {
        let mut window = InflightWindow::new(1);
        assert!(window.push(msg()).is_some());
        assert!(window.push(msg()).is_none());
    }

    #[test]
    fn ack_frees_capacity() {
        let mut window = InflightWindow::new(1);
        let id = window.push(msg()).unwrap();
        assert!(window.push(msg()).is_none());
        window.ack(id);
        assert!(window.push(msg()).is_some());
    }

    #[test]
    fn restore_reuses_packet_id_on_reconnect() {
        let mut window = InflightWindow::new(4);
        window.restore(42, msg(), 1);
        assert_eq!(window.get(42).unwrap().retry_count, 1);
    }
}
