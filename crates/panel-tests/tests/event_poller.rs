//! Integration tests for channel event subscriptions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use panel_core::ChannelEvent;
use panel_http::{Method, Transport};
use panel_nodes::{EventPoller, NodeClient};
use panel_tests::{MockTransport, Reply};
use serde_json::json;
use tokio::sync::Notify;
use tokio::time::Instant;

const WAIT_NEXT: &str = "/events/wait_next";
const HANDLED: &str = "/events/handled";

fn event(kind: &str) -> Reply {
    Reply::Json(json!({ "type": kind }))
}

/// Park every further `wait_next` until `gate` opens.
fn park(node: &MockTransport, gate: &Arc<Notify>) {
    node.on(
        Method::Post,
        WAIT_NEXT,
        Reply::Gated(Arc::clone(gate), Box::new(event("ChannelClosed"))),
    );
}

async fn wait_for_calls(node: &MockTransport, path: &str, n: usize) {
    while node.count(Method::Post, path) < n {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_events_are_delivered_and_acknowledged() -> Result<()> {
    println!("Testing event delivery...");
    let node = MockTransport::new("alice");
    node.push(Method::Post, WAIT_NEXT, event("ChannelPending"))
        .push(Method::Post, WAIT_NEXT, event("ChannelReady"))
        .push(Method::Post, WAIT_NEXT, event("PaymentReceived"))
        .post(HANDLED, json!({}));
    park(&node, &Arc::new(Notify::new()));

    let poller = EventPoller::new();
    let mut events = poller
        .subscribe_stream(&NodeClient::new(node.clone()))
        .expect("first subscription");

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(events.next().await.expect("event"));
    }
    assert_eq!(
        seen,
        [ChannelEvent::Pending, ChannelEvent::Open, ChannelEvent::Unknown]
    );
    assert_eq!(node.count(Method::Post, HANDLED), 3);
    println!("  ✓ Delivered {seen:?}");

    poller.shutdown().await;
    assert!(events.next().await.is_none(), "stream ends on shutdown");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_one_subscription_per_node() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let alice = MockTransport::new("alice");
    park(&alice, &gate);
    let alice_again = MockTransport::new("alice");
    park(&alice_again, &gate);
    let bob = MockTransport::new("bob");
    park(&bob, &gate);

    let poller = EventPoller::new();
    assert!(poller.subscribe(&NodeClient::new(alice.clone()), |_| {}));
    assert!(!poller.subscribe(&NodeClient::new(alice.clone()), |_| {}));
    // Same (network, name), different transport: still the same node.
    assert!(!poller.subscribe(&NodeClient::new(alice_again.clone()), |_| {}));
    assert!(poller.subscribe(&NodeClient::new(bob.clone()), |_| {}));

    wait_for_calls(&alice, WAIT_NEXT, 1).await;
    wait_for_calls(&bob, WAIT_NEXT, 1).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(alice.count(Method::Post, WAIT_NEXT), 1, "a single poll loop per node");
    assert_eq!(alice_again.count(Method::Post, WAIT_NEXT), 0);

    let alice_endpoint = alice.endpoint().clone();
    assert!(poller.unsubscribe(&alice_endpoint));
    assert!(!poller.unsubscribe(&alice_endpoint));
    assert!(!poller.is_subscribed(&alice_endpoint));
    assert!(poller.is_subscribed(bob.endpoint()));

    poller.shutdown().await;
    assert!(!poller.is_subscribed(bob.endpoint()));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_delivery_after_unsubscribe() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let node = MockTransport::new("alice");
    node.on(
        Method::Post,
        WAIT_NEXT,
        Reply::Gated(Arc::clone(&gate), Box::new(event("ChannelReady"))),
    )
    .post(HANDLED, json!({}));

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let poller = EventPoller::new();
    let client = NodeClient::new(node.clone());
    assert!(poller.subscribe(&client, move |e| sink.lock().unwrap().push(e)));

    wait_for_calls(&node, WAIT_NEXT, 1).await;
    assert!(poller.unsubscribe(client.endpoint()));

    // Opening the gate after the unsubscribe delivers nothing.
    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert!(delivered.lock().unwrap().is_empty());
    assert_eq!(node.count(Method::Post, HANDLED), 0);
    assert_eq!(node.count(Method::Post, WAIT_NEXT), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failures_back_off_and_keep_polling() -> Result<()> {
    let node = MockTransport::new("alice");
    node.push(Method::Post, WAIT_NEXT, Reply::Fail("connection refused".into()))
        .push(Method::Post, WAIT_NEXT, Reply::Fail("connection refused".into()))
        .push(Method::Post, WAIT_NEXT, event("ChannelPending"))
        .post(HANDLED, json!({}));
    park(&node, &Arc::new(Notify::new()));

    let poller = EventPoller::new();
    let started = Instant::now();
    let mut events = poller
        .subscribe_stream(&NodeClient::new(node.clone()))
        .expect("subscription");

    assert_eq!(events.next().await, Some(ChannelEvent::Pending));
    // Each failure costs the backoff plus the re-arm delay.
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(node.count(Method::Post, WAIT_NEXT), 3);
    assert_eq!(node.count(Method::Post, HANDLED), 1);

    poller.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_acknowledgement_drops_event() -> Result<()> {
    let node = MockTransport::new("alice");
    node.push(Method::Post, WAIT_NEXT, event("ChannelReady"))
        .push(Method::Post, WAIT_NEXT, event("ChannelClosed"))
        .push(Method::Post, HANDLED, Reply::Fail("busy".into()))
        .post(HANDLED, json!({}));
    park(&node, &Arc::new(Notify::new()));

    let poller = EventPoller::new();
    let mut events = poller
        .subscribe_stream(&NodeClient::new(node.clone()))
        .expect("subscription");

    assert_eq!(events.next().await, Some(ChannelEvent::Closed));
    assert_eq!(node.count(Method::Post, HANDLED), 2);

    poller.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_callback_is_never_invoked() -> Result<()> {
    let node = MockTransport::new("alice");
    node.push(Method::Post, WAIT_NEXT, event("ChannelReady"))
        .push(Method::Post, WAIT_NEXT, event("ChannelClosed"))
        .post(HANDLED, json!({}));
    park(&node, &Arc::new(Notify::new()));

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let client = NodeClient::new(node.clone());
    let poller = EventPoller::new();

    let sink = Arc::clone(&first);
    assert!(poller.subscribe(&client, move |e| sink.lock().unwrap().push(e)));
    let sink = Arc::clone(&second);
    assert!(!poller.subscribe(&client, move |e| sink.lock().unwrap().push(e)));

    // Both scripted events plus the parked third wait.
    wait_for_calls(&node, WAIT_NEXT, 3).await;
    assert_eq!(*first.lock().unwrap(), [ChannelEvent::Open, ChannelEvent::Closed]);
    assert!(second.lock().unwrap().is_empty());

    poller.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_never_overlaps_pending_wait() -> Result<()> {
    let node = MockTransport::new("alice");
    park(&node, &Arc::new(Notify::new()));
    let client = NodeClient::new(node.clone());
    let poller = EventPoller::new();

    assert!(poller.subscribe(&client, |_| {}));
    wait_for_calls(&node, WAIT_NEXT, 1).await;
    assert_eq!(node.in_flight(Method::Post, WAIT_NEXT), 1);

    assert!(poller.unsubscribe(client.endpoint()));
    assert!(poller.subscribe(&client, |_| {}));
    wait_for_calls(&node, WAIT_NEXT, 2).await;
    assert_eq!(node.in_flight(Method::Post, WAIT_NEXT), 1);
    assert_eq!(node.count(Method::Post, HANDLED), 0);

    poller.shutdown().await;
    assert_eq!(node.in_flight(Method::Post, WAIT_NEXT), 0);
    Ok(())
}
