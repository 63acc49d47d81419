// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Decoded-packet contracts the core expects from its wire codec
//! collaborator (spec §6). The core never parses MQTT bytes itself; a real
//! deployment plugs in a codec crate (e.g. the teacher repo's own
//! `hebo_codec`) that turns bytes into these types and back. Only the
//! fields the routing/dispatch core actually touches are modeled here.

use crate::index::SubscriptionOptions;

/// The three MQTT protocol revisions the core must behave correctly under
/// (spec §6). The core does not itself encode/decode per-version wire
/// differences; it only needs to know which reason-code table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3_1,
    V3_1_1,
    V5,
}

/// A decoded CONNECT, stripped of wire-format concerns.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub protocol_version: ProtocolVersion,
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive_secs: u16,
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub will: Option<WillMessage>,
    pub receive_maximum: u16,
    pub session_expiry_interval: u32,
}

#[derive(Debug, Clone)]
pub struct WillMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: u8,
    pub retain: bool,
    pub delay_interval: u32,
}

/// CONNACK, as the session layer hands it to the codec for encoding.
#[derive(Debug, Clone)]
pub struct ConnAck {
    pub session_present: bool,
    pub reason: ConnectReason,
}

/// MQTT 5 reason codes relevant to CONNECT/AUTH outcomes (spec §6: "MQTT 5
/// reason codes are surfaced from authentication/authorization failures").
/// 3.1/3.1.1 connections are mapped onto the closest reason at the listener
/// boundary; the core always speaks in these terms internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReason {
    Success,
    UnspecifiedError,
    MalformedPacket,
    ProtocolError,
    NotAuthorized,
    BadUsernameOrPassword,
    ClientIdentifierNotValid,
    ServerUnavailable,
    QuotaExceeded,
}

/// Reason attached to PUBACK/SUBACK-equivalent outcomes and to session
/// teardown (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    NormalDisconnection,
    SessionTakenOver,
    KeepAliveTimeout,
    AdministrativeAction,
    ProtocolError,
    QuotaExceeded,
    ServerShuttingDown,
}

/// A decoded SUBSCRIBE's one filter entry.
#[derive(Debug, Clone)]
pub struct SubscribeRequestEntry {
    pub filter: String,
    pub options: SubscriptionOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubAckReason {
    GrantedQos0,
    GrantedQos1,
    GrantedQos2,
    UnspecifiedError,
    NotAuthorized,
    TopicFilterInvalid,
    QuotaExceeded,
    SharedSubscriptionsNotSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubAckReason {
    Success,
    NoSubscriptionExisted,
    NotAuthorized,
    TopicFilterInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubAckReason {
    Success,
    NoMatchingSubscribers,
    UnspecifiedError,
    NotAuthorized,
    TopicNameInvalid,
    QuotaExceeded,
}
