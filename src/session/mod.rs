// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Per-client session state machine (spec §4.6): owns subscriptions,
//! inflight window, message queue, QoS acks, keepalive, and will. Each
//! session is a long-lived task with exclusive ownership of its state
//! (spec §5, SPEC_FULL §2.0 "process-per-session -> task-per-session"); the
//! transport socket itself is an external collaborator, so this task talks
//! to its owner only through the `ToSession`/`FromSession` channels.

mod commands;
mod expiry;
mod inflight;
mod queue;
mod registry;

pub use commands::{FromSession, ToSession};
pub use expiry::ExpiryDeadline;
pub use inflight::{InflightEntry, InflightWindow, PacketIdAllocator};
pub use queue::{MessageQueue, PushOutcome};
pub use registry::{RegisterOutcome, SessionRegistry};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, Interval};

use crate::acl::AclCache;
use crate::config::SessionConfig;
use crate::index::SubscriptionOptions;
use crate::message::Message;
use crate::types::{PacketId, SessionGid};
use crate::wire::{DisconnectReason, WillMessage};

/// Session lifecycle states (spec §4.6): `Idle -> Connecting -> Connected
/// -> Disconnected -> (Reaped)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Reaped,
}

/// Per-client session state (spec §3, §4.6).
pub struct Session {
    gid: SessionGid,
    client_id: String,
    status: Status,
    clean_start: bool,

    subscriptions: HashMap<String, SubscriptionOptions>,
    inflight: InflightWindow,
    queue: MessageQueue,
    acl_cache: AclCache,

    will: Option<WillMessage>,
    keepalive: Duration,
    last_activity: Instant,
    expiry: Option<ExpiryDeadline>,

    config: SessionConfig,
}

impl Session {
    #[must_use]
    pub fn new(
        gid: SessionGid,
        client_id: impl Into<String>,
        clean_start: bool,
        keepalive: Duration,
        receive_maximum: u16,
        will: Option<WillMessage>,
        config: SessionConfig,
        acl_max_size: usize,
        acl_ttl: Option<Duration>,
    ) -> Self {
        Self {
            gid,
            client_id: client_id.into(),
            status: Status::Idle,
            clean_start,
            subscriptions: HashMap::new(),
            inflight: InflightWindow::new(receive_maximum as usize),
            queue: MessageQueue::new(config.queue_max, config.high_watermark, config.queue_overflow),
            acl_cache: AclCache::new(acl_max_size, acl_ttl),
            will,
            keepalive,
            last_activity: Instant::now(),
            expiry: None,
            config,
        }
    }

    #[must_use]
    pub const fn gid(&self) -> SessionGid {
        self.gid
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub const fn clean_start(&self) -> bool {
        self.clean_start
    }

    #[must_use]
    pub fn acl_cache_mut(&mut self) -> &mut AclCache {
        &mut self.acl_cache
    }

    /// `Idle -> Connecting`, per spec §4.6.
    pub fn begin_connecting(&mut self) {
        self.status = Status::Connecting;
    }

    /// `Connecting -> Connected`. Returns whether `session_present` should
    /// be reported: true iff a prior non-clean session's state (recorded
    /// via `resume`) was actually recovered.
    pub fn complete_connect(&mut self, resumed: bool) -> bool {
        self.status = Status::Connected;
        self.last_activity = Instant::now();
        resumed && !self.clean_start
    }

    /// Restores persisted subscriptions and inflight state from a prior
    /// non-clean session (spec §4.6: "Retransmission of unacked inflight
    /// uses the same packet-id on reconnect when session is resumed").
    pub fn resume_from(&mut self, subscriptions: HashMap<String, SubscriptionOptions>, inflight: Vec<(PacketId, InflightEntry)>) {
        self.subscriptions = subscriptions;
        for (packet_id, entry) in inflight {
            self.inflight.restore(packet_id, entry.message, entry.retry_count);
        }
    }

    pub fn record_subscription(&mut self, filter: String, options: SubscriptionOptions) {
        self.subscriptions.insert(filter, options);
    }

    pub fn forget_subscription(&mut self, filter: &str) {
        self.subscriptions.remove(filter);
    }

    #[must_use]
    pub fn subscriptions(&self) -> &HashMap<String, SubscriptionOptions> {
        &self.subscriptions
    }

    #[must_use]
    pub fn is_subscribed(&self, filter: &str) -> bool {
        self.subscriptions.contains_key(filter)
    }

    /// Enqueues a matched publish for delivery (spec §4.5 local fanout
    /// target). `no_local` filtering happens in the dispatch path before
    /// this is called, since it requires comparing against the publisher.
    pub fn enqueue(&mut self, message: Message) -> PushOutcome {
        self.last_activity = Instant::now();
        self.queue.push(message)
    }

    #[must_use]
    pub fn pop_outbound(&mut self) -> Option<Message> {
        self.queue.pop()
    }

    #[must_use]
    pub fn backpressured(&self) -> bool {
        self.queue.over_high_watermark()
    }

    pub fn admit_inflight(&mut self, message: Message) -> Option<PacketId> {
        self.inflight.push(message)
    }

    pub fn ack_inflight(&mut self, packet_id: PacketId) -> Option<InflightEntry> {
        self.inflight.ack(packet_id)
    }

    #[must_use]
    pub fn inflight_full(&self) -> bool {
        self.inflight.is_full()
    }

    /// Scans for inflight entries overdue for retransmission, bumping each
    /// one's retry count. Returns packet ids that just exceeded
    /// `retry_max` (spec §8 property 6: the caller must disconnect).
    pub fn retry_overdue(&mut self, retry_timeout: Duration) -> Vec<PacketId> {
        let deadline = Instant::now()
            .checked_sub(retry_timeout)
            .unwrap_or_else(Instant::now);
        let overdue = self.inflight.overdue(deadline);
        let mut exceeded = Vec::new();
        for packet_id in overdue {
            if let Some(count) = self.inflight.mark_retried(packet_id) {
                if count > self.config.retry_max {
                    exceeded.push(packet_id);
                }
            }
        }
        exceeded
    }

    pub fn note_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Keepalive timeout check (spec §4.6: "> 1.5 x keepalive with no byte
    /// received").
    #[must_use]
    pub fn keepalive_expired(&self) -> bool {
        if self.keepalive.is_zero() {
            return false;
        }
        self.last_activity.elapsed() > self.keepalive.mul_f64(1.5)
    }

    /// `Connected -> Disconnected`. Returns the will message to publish,
    /// unless `suppress_will` (a clean DISCONNECT with no-will semantics,
    /// spec §4.6). Also stamps the expiry deadline (spec §4.6,
    /// `Disconnected -> Reaped` fires once it elapses).
    pub fn disconnect(&mut self, suppress_will: bool) -> Option<WillMessage> {
        self.status = Status::Disconnected;
        self.expiry = Some(ExpiryDeadline::for_disconnect(
            self.clean_start,
            Duration::from_secs(self.config.expiry_default_secs),
            None,
        ));
        if suppress_will {
            self.will.take();
            None
        } else {
            self.will.take()
        }
    }

    /// Whether this disconnected session's expiry has elapsed and it is
    /// ready for `reap()` (spec §4.6: "Disconnected -> Reaped when session
    /// expiry elapses").
    #[must_use]
    pub fn ready_to_reap(&self) -> bool {
        self.status == Status::Disconnected
            && self.expiry.is_some_and(ExpiryDeadline::has_elapsed)
    }

    /// Converts a will record into the `Message` the dispatch path expects,
    /// the way a real PUBLISH minted from a CONNECT's will payload would
    /// look (spec §4.6).
    fn will_as_message(&self, will: Option<WillMessage>) -> Option<Message> {
        will.map(|w| {
            Message::new(
                0,
                self.client_id.clone(),
                crate::message::Qos::from_u8(w.qos).unwrap_or(crate::message::Qos::AtMostOnce),
                crate::topic::Topic::parse(&w.topic).unwrap_or_else(|_| crate::topic::Topic::parse("will").unwrap()),
                w.payload,
            )
            .with_flags(crate::message::MessageFlags {
                dup: false,
                retain: w.retain,
                sys: false,
            })
        })
    }

    /// `Disconnected -> Reaped`.
    pub fn reap(&mut self) {
        self.status = Status::Reaped;
        self.queue.drain();
        self.inflight.drain();
    }

    #[must_use]
    pub fn is_clean_teardown(&self) -> bool {
        self.clean_start && self.status == Status::Disconnected
    }

    /// Drives the session's event loop: delivers queued messages, applies
    /// QoS acks arriving from the client, and watches the keepalive and
    /// retry timers. `to_client` hands matched `Message`s to the external
    /// codec/listener for encoding and writing; `events` reports lifecycle
    /// transitions back to the registry (spec §5: cancellation notifies the
    /// registry).
    pub async fn run_loop(
        mut self,
        mut inbound: mpsc::Receiver<ToSession>,
        to_client: mpsc::Sender<Message>,
        events: mpsc::Sender<FromSession>,
        retry_timeout: Duration,
    ) {
        self.begin_connecting();
        self.complete_connect(false);

        let mut ticker: Interval = interval(Duration::from_millis(500));
        let disconnect_reason;

        loop {
            tokio::select! {
                maybe_cmd = inbound.recv() => {
                    match maybe_cmd {
                        Some(ToSession::Deliver(message)) => {
                            match self.enqueue(message) {
                                PushOutcome::MustDisconnect => {
                                    disconnect_reason = DisconnectReason::QuotaExceeded;
                                    break;
                                }
                                _ => {
                                    while let Some(out) = self.pop_outbound() {
                                        if out.qos() != crate::message::Qos::AtMostOnce {
                                            self.admit_inflight(out.clone());
                                        }
                                        if to_client.send(out).await.is_err() {
                                            disconnect_reason = DisconnectReason::NormalDisconnection;
                                            let will = self.disconnect(false);
                                            let publish = self.will_as_message(will);
                                            let _ = events.send(FromSession::Disconnected { reason: disconnect_reason, will: publish }).await;
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                        Some(ToSession::PubAck(id) | ToSession::PubComp(id)) => {
                            self.ack_inflight(id);
                            self.note_activity();
                        }
                        Some(ToSession::PubRec(_) | ToSession::PubRel(_)) => {
                            self.note_activity();
                        }
                        Some(ToSession::Kick(reason)) => {
                            disconnect_reason = reason;
                            break;
                        }
                        Some(ToSession::Takeover) => {
                            disconnect_reason = DisconnectReason::SessionTakenOver;
                            break;
                        }
                        None => {
                            disconnect_reason = DisconnectReason::NormalDisconnection;
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.keepalive_expired() {
                        disconnect_reason = DisconnectReason::KeepAliveTimeout;
                        break;
                    }
                    if !self.retry_overdue(retry_timeout).is_empty() {
                        disconnect_reason = DisconnectReason::ProtocolError;
                        break;
                    }
                }
            }
        }

        let suppress_will = matches!(disconnect_reason, DisconnectReason::NormalDisconnection);
        let will = self.disconnect(suppress_will);
        let publish = self.will_as_message(will);
        let _ = events
            .send(FromSession::Disconnected {
                reason: disconnect_reason,
                will: publish,
            })
            .await;
    }
}
