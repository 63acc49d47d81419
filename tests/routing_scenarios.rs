// Copyright (c) 2024 Broker Core Contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! End-to-end routing/dispatch scenarios driven entirely through in-memory
//! channels, no real sockets: each "session" is a bare `mpsc::Receiver` the
//! test asserts against directly rather than a full `Session` task.

use std::sync::Arc;
use std::time::Duration;

use routercore::config::SharedSubscriptionPolicy;
use routercore::dispatch::Broker;
use routercore::index::SubscriptionOptions;
use routercore::message::{Message, MessageFlags, Qos};
use routercore::retained::RetainedStore;
use routercore::route::{LockMode, RouterWorkerPool};
use routercore::session::{RegisterOutcome, SessionRegistry, ToSession};
use routercore::topic::Topic;
use routercore::types::SessionGid;

use tokio::sync::mpsc;
use tokio::time::timeout;

fn new_broker(policy: SharedSubscriptionPolicy) -> Broker {
    let routes = Arc::new(RouterWorkerPool::spawn(4, LockMode::Key, None));
    let retained = Arc::new(RetainedStore::new());
    Broker::new(1, routes, retained, policy, None)
}

fn attach(broker: &Broker, gid: SessionGid) -> mpsc::Receiver<ToSession> {
    let (tx, rx) = mpsc::channel(16);
    broker.register_session(gid, tx);
    rx
}

async fn recv_deliver(rx: &mut mpsc::Receiver<ToSession>) -> Message {
    match timeout(Duration::from_secs(1), rx.recv()).await {
        Ok(Some(ToSession::Deliver(message))) => message,
        Ok(Some(other)) => panic!("expected Deliver, got something else: {other:?}"),
        Ok(None) => panic!("channel closed with no message"),
        Err(_) => panic!("timed out waiting for delivery"),
    }
}

async fn expect_no_delivery(rx: &mut mpsc::Receiver<ToSession>) {
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "expected no delivery, but one arrived"
    );
}

fn publish_msg(from: &str, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Message {
    Message::new(0, from, qos, Topic::parse(topic).unwrap(), payload.to_vec()).with_flags(MessageFlags {
        dup: false,
        retain,
        sys: false,
    })
}

/// S1 - exact match: a subscriber on the literal topic receives the publish
/// with its payload and qos intact.
#[tokio::test]
async fn s1_exact_match_delivers() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let a = SessionGid::new(0, 1);
    let mut a_rx = attach(&broker, a);

    broker
        .subscribe(a, "room/1/temp", SubscriptionOptions { qos: 1, ..Default::default() })
        .await
        .unwrap();

    broker
        .publish(publish_msg("B", "room/1/temp", b"22", Qos::AtLeastOnce, false))
        .await
        .unwrap();

    let delivered = recv_deliver(&mut a_rx).await;
    assert_eq!(delivered.payload(), b"22");
    assert_eq!(delivered.topic().as_str(), "room/1/temp");
    assert_eq!(delivered.qos(), Qos::AtLeastOnce);
}

/// S2 - single-level wildcard matches one level and nothing more or less.
#[tokio::test]
async fn s2_single_level_wildcard() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let a = SessionGid::new(0, 1);
    let mut a_rx = attach(&broker, a);

    broker
        .subscribe(a, "room/+/temp", SubscriptionOptions::default())
        .await
        .unwrap();

    broker
        .publish(publish_msg("B", "room/42/temp", b"23", Qos::AtMostOnce, false))
        .await
        .unwrap();
    assert_eq!(recv_deliver(&mut a_rx).await.payload(), b"23");

    broker
        .publish(publish_msg("B", "room/temp", b"x", Qos::AtMostOnce, false))
        .await
        .unwrap();
    expect_no_delivery(&mut a_rx).await;
}

/// S3 - a subscription to `#` never receives `$SYS` traffic.
#[tokio::test]
async fn s3_multi_level_wildcard_excludes_sys() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let a = SessionGid::new(0, 1);
    let mut a_rx = attach(&broker, a);

    broker.subscribe(a, "#", SubscriptionOptions::default()).await.unwrap();

    let sys_msg = publish_msg("broker", "$SYS/brokers/1/uptime", b"100", Qos::AtMostOnce, false)
        .with_flags(MessageFlags { dup: false, retain: false, sys: true });
    broker.publish(sys_msg).await.unwrap();

    expect_no_delivery(&mut a_rx).await;
}

/// S4 - a retained publish is replayed to a subscriber that arrives later;
/// an empty-payload retained publish deletes it instead.
#[tokio::test]
async fn s4_retained_delivery_and_deletion() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);

    broker
        .publish(publish_msg("B", "s/k", b"1", Qos::AtMostOnce, true))
        .await
        .unwrap();

    let a = SessionGid::new(0, 1);
    let _a_rx = attach(&broker, a);
    let replayed = broker
        .subscribe(a, "s/k", SubscriptionOptions::default())
        .await
        .unwrap();
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].payload(), b"1");
    assert!(replayed[0].flags().retain);

    broker
        .publish(publish_msg("B", "s/k", b"", Qos::AtMostOnce, true))
        .await
        .unwrap();

    let c = SessionGid::new(0, 2);
    let _c_rx = attach(&broker, c);
    let replayed = broker
        .subscribe(c, "s/k", SubscriptionOptions::default())
        .await
        .unwrap();
    assert!(replayed.is_empty());
}

/// S5 - a shared subscription group under round-robin splits N publishes
/// evenly across its k members.
#[tokio::test]
async fn s5_shared_subscription_round_robin_fairness() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let members = [SessionGid::new(0, 1), SessionGid::new(0, 2), SessionGid::new(0, 3)];
    let mut receivers: Vec<_> = members.iter().map(|gid| attach(&broker, *gid)).collect();

    for gid in members {
        broker
            .subscribe(gid, "$share/g/j/#", SubscriptionOptions::default())
            .await
            .unwrap();
    }

    for i in 0..6 {
        broker
            .publish(publish_msg("B", "j/x", format!("{i}").as_bytes(), Qos::AtMostOnce, false))
            .await
            .unwrap();
    }

    let mut counts = vec![0usize; receivers.len()];
    for (index, rx) in receivers.iter_mut().enumerate() {
        while timeout(Duration::from_millis(50), rx.recv()).await.is_ok() {
            counts[index] += 1;
        }
    }
    assert_eq!(counts, vec![2, 2, 2], "round robin over 6 publishes to 3 members should be 2 each");
}

/// S6 - a second CONNECT under the same client id displaces the first
/// connection (`ToSession::Takeover`) while its subscriptions stay live in
/// the broker's local index under the same `SessionGid`, the way a real
/// listener resumes a non-clean session onto a fresh connection handle.
#[tokio::test]
async fn s6_session_takeover_displaces_prior_connection() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let registry = SessionRegistry::new();
    let a = SessionGid::new(0, 1);
    let mut a_rx = attach(&broker, a);

    let (a_cmd_tx, mut a_cmd_rx) = mpsc::channel(4);
    let outcome = registry.register("c1", a, a_cmd_tx).await;
    assert!(matches!(outcome, RegisterOutcome::Fresh));
    broker
        .subscribe(a, "t", SubscriptionOptions::default())
        .await
        .unwrap();

    let (a_prime_cmd_tx, _a_prime_cmd_rx) = mpsc::channel(4);
    let outcome = registry.register("c1", a, a_prime_cmd_tx).await;
    assert!(matches!(outcome, RegisterOutcome::Displaced { previous } if previous == a));
    assert!(matches!(a_cmd_rx.recv().await, Some(ToSession::Takeover)));

    // The subscription survives the takeover since the resumed connection
    // keeps the same `SessionGid` in the broker's local index.
    broker
        .publish(publish_msg("B", "t", b"still-subscribed", Qos::AtMostOnce, false))
        .await
        .unwrap();
    assert_eq!(recv_deliver(&mut a_rx).await.payload(), b"still-subscribed");
}

/// A `no_local` subscriber never receives its own publish, the one piece of
/// dispatch behaviour that depends on the publisher's identity.
#[tokio::test]
async fn no_local_skips_the_publisher() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let publisher = SessionGid::new(0, 1);
    let mut pub_rx = attach(&broker, publisher);

    broker
        .subscribe(publisher, "t", SubscriptionOptions { no_local: true, ..Default::default() })
        .await
        .unwrap();

    broker
        .publish_from(Some(publisher), publish_msg("c1", "t", b"hi", Qos::AtMostOnce, false))
        .await
        .unwrap();

    expect_no_delivery(&mut pub_rx).await;
}

/// Session death tears down every route it owned, so a later publish to the
/// same filter finds no local destination left.
#[tokio::test]
async fn session_death_drops_routes() {
    let broker = new_broker(SharedSubscriptionPolicy::RoundRobin);
    let a = SessionGid::new(0, 1);
    let mut a_rx = attach(&broker, a);

    broker.subscribe(a, "a/#", SubscriptionOptions::default()).await.unwrap();
    broker.remove_session(a).await.unwrap();

    broker
        .publish(publish_msg("B", "a/b", b"x", Qos::AtMostOnce, false))
        .await
        .unwrap();
    expect_no_delivery(&mut a_rx).await;
}
