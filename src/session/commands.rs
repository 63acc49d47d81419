// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Channel command types linking a session task to the broker dispatch
//! path and the session registry, in the style of the teacher's
//! `commands.rs` but scoped to what the routing core owns.

use crate::message::Message;
use crate::types::PacketId;
use crate::wire::DisconnectReason;

/// Sent to a session task: either a message to enqueue, a QoS ack arriving
/// from the (external) codec/listener, or a control action.
#[derive(Debug, Clone)]
pub enum ToSession {
    /// Broker dispatch enqueuing a matched publish (spec §4.5).
    Deliver(Message),
    /// Client acknowledged a QoS 1 publish.
    PubAck(PacketId),
    /// Client acknowledged receipt of a QoS 2 publish.
    PubRec(PacketId),
    /// Client confirms release of a QoS 2 publish.
    PubRel(PacketId),
    /// Client confirms completion of a QoS 2 publish.
    PubComp(PacketId),
    /// Administrative kick (spec §4.6).
    Kick(DisconnectReason),
    /// A new connection with the same client id has taken over (spec §3,
    /// §4.6, §8 property S6).
    Takeover,
}

/// Sent from a session task to whatever owns its lifecycle (the listener
/// or an in-process registry in tests): lifecycle notifications the
/// registry uses to reconcile routes and the session map (spec §5).
#[derive(Debug, Clone)]
pub enum FromSession {
    Disconnected {
        reason: DisconnectReason,
        will: Option<Message>,
    },
}
