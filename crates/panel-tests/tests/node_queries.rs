//! Integration tests for typed node queries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use panel_core::{ChannelStatus, Error};
use panel_http::Method;
use panel_nodes::NodeClient;
use panel_tests::{MockTransport, Reply, channel_json};
use serde_json::json;
use tokio::sync::Notify;

fn node_with_status(name: &str) -> Arc<MockTransport> {
    let node = MockTransport::new(name);
    node.get("/node_id", json!({ "node_id": format!("02{name}") }))
        .get(
            "/status",
            json!({ "is_running": true, "is_listening": true, "best_block_height": 150 }),
        );
    node
}

#[tokio::test]
async fn test_get_info_counts_channels_by_readiness() -> Result<()> {
    let node = node_with_status("alice");
    node.get(
        "/channels",
        json!([
            channel_json("1", Some("aa:0"), true),
            channel_json("2", None, false),
            channel_json("3", Some("bb:1"), false),
        ]),
    );

    let info = NodeClient::new(node.clone()).get_info().await?;

    assert_eq!(info.pubkey, "02alice");
    assert_eq!(info.alias, "alice");
    assert_eq!(info.rpc_url, "02alice@alice");
    assert!(info.synced_to_chain);
    assert_eq!(info.block_height, 150);
    assert_eq!(info.num_active_channels, 1);
    assert_eq!(info.num_pending_channels, 2);
    assert_eq!(info.num_inactive_channels, 0);
    Ok(())
}

#[tokio::test]
async fn test_get_info_issues_reads_concurrently() -> Result<()> {
    let node = MockTransport::new("alice");
    let gate = Arc::new(Notify::new());
    node.on(
        Method::Get,
        "/node_id",
        Reply::Gated(
            Arc::clone(&gate),
            Box::new(Reply::Json(json!({ "node_id": "02alice" }))),
        ),
    )
    .get(
        "/status",
        json!({ "is_running": false, "best_block_height": 1 }),
    )
    .get("/channels", json!([]));

    let client = NodeClient::new(node.clone());
    let task = tokio::spawn(async move { client.get_info().await });

    // /node_id is held open; the other two reads must still go out.
    while node.count(Method::Get, "/status") == 0 || node.count(Method::Get, "/channels") == 0 {
        tokio::task::yield_now().await;
    }
    assert!(!task.is_finished());

    gate.notify_one();
    let info = task.await??;
    assert_eq!(info.pubkey, "02alice");
    assert!(!info.synced_to_chain);
    Ok(())
}

#[tokio::test]
async fn test_get_info_fails_if_any_read_fails() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get("/node_id", json!({ "node_id": "02alice" }))
        .on(Method::Get, "/status", Reply::Fail("node is starting".into()))
        .get("/channels", json!([]));

    let err = NodeClient::new(node.clone()).get_info().await.unwrap_err();
    assert_eq!(err.to_string(), "GET /status failed: node is starting");
    Ok(())
}

#[tokio::test]
async fn test_balances_fully_confirmed() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get(
        "/balances",
        json!({
            "total_onchain_balance_sats": 1000,
            "spendable_onchain_balance_sats": 1000,
            "total_anchor_channels_reserve_sats": 0,
            "total_lightning_balance_sats": 0
        }),
    );

    let balances = NodeClient::new(node.clone()).get_balances().await?;
    assert_eq!(balances.total.to_string(), "1000");
    assert_eq!(balances.confirmed.to_string(), "1000");
    assert_eq!(balances.unconfirmed.to_string(), "0");
    Ok(())
}

#[tokio::test]
async fn test_balances_never_negative() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get(
        "/balances",
        json!({ "total_onchain_balance_sats": 500, "spendable_onchain_balance_sats": 800 }),
    );

    let balances = NodeClient::new(node.clone()).get_balances().await?;
    assert_eq!(balances.unconfirmed, 0);
    Ok(())
}

#[tokio::test]
async fn test_channel_status_follows_readiness() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get(
        "/channels",
        json!([
            channel_json("1", Some("0123456789abcdef0123:0"), true),
            channel_json("2", None, false),
        ]),
    );

    let channels = NodeClient::new(node.clone()).get_channels().await?;
    assert_eq!(channels.len(), 2);
    for chan in &channels {
        assert_eq!(chan.status == ChannelStatus::Open, !chan.pending);
    }

    assert_eq!(channels[0].unique_id, "89abcdef0123");
    assert_eq!(channels[0].local_balance, 40_000);
    assert_eq!(channels[0].remote_balance, 9_000);
    assert_eq!(channels[1].status, ChannelStatus::Opening);
    assert_eq!(channels[1].channel_point, None);
    assert_eq!(channels[1].unique_id, "000000000002");
    Ok(())
}

#[tokio::test]
async fn test_peers_and_new_address() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get(
        "/peers",
        json!([{ "node_id": "02bob", "address": "bob:9735", "is_persisted": false, "is_connected": true }]),
    )
    .post("/wallet/new_address", json!({ "address": "bcrt1qexample" }));

    let client = NodeClient::new(node.clone());
    let peers = client.get_peers().await?;
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].pubkey, "02bob");
    assert_eq!(peers[0].address, "bob:9735");

    assert_eq!(client.get_new_address().await?, "bcrt1qexample");
    assert_eq!(node.last_body(Method::Post, "/wallet/new_address"), Some(json!({})));
    Ok(())
}

#[tokio::test]
async fn test_connect_peers_is_best_effort() -> Result<()> {
    let node = MockTransport::new("alice");
    node.push(Method::Post, "/peers/connect", Reply::Fail("connection refused".into()))
        .post("/peers/connect", json!({}));

    NodeClient::new(node.clone())
        .connect_peers(&["02bob@bob:9735", "not-an-address", "02carol@carol:9735"])
        .await;

    // The malformed entry is skipped, the failure does not stop the batch.
    assert_eq!(node.count(Method::Post, "/peers/connect"), 2);
    assert_eq!(
        node.last_body(Method::Post, "/peers/connect"),
        Some(json!({ "node_id": "02carol", "address": "carol:9735", "persist": false }))
    );
    Ok(())
}

#[tokio::test]
async fn test_invoice_round_trip_bodies() -> Result<()> {
    let node = MockTransport::new("alice");
    node.post("/bolt11/receive", json!({ "invoice": "lnbcrt10u1example" }))
        .post(
            "/bolt11/decode",
            json!({
                "payment_hash": "abcd",
                "destination": "02alice",
                "amount_msat": null,
                "expiry_secs": 3600
            }),
        )
        .post(
            "/bolt11/pay",
            json!({
                "payment_id": "p1",
                "preimage": "ffee",
                "amount_sats": 1000,
                "destination": "02bob",
                "fee_paid_msat": 0
            }),
        );
    let client = NodeClient::new(node.clone());

    let invoice = client.create_invoice(1000, None).await?;
    assert_eq!(invoice, "lnbcrt10u1example");
    assert_eq!(
        node.last_body(Method::Post, "/bolt11/receive"),
        Some(json!({ "amount_msat": 1_000_000, "description": "Payment to alice", "expiry_secs": 3600 }))
    );

    let request = client.decode_invoice(&invoice).await?;
    assert_eq!(request.payment_hash, "abcd");
    assert_eq!(request.amount_msat, 0);
    assert_eq!(request.expiry_secs, 3600);

    let receipt = client.pay_invoice(&invoice, None).await?;
    assert_eq!(receipt.preimage, "ffee");
    assert_eq!(receipt.amount_sats, 1000);
    assert_eq!(
        node.last_body(Method::Post, "/bolt11/pay"),
        Some(json!({ "invoice": "lnbcrt10u1example" }))
    );

    client.pay_invoice_and_wait(&invoice, Some(25)).await?;
    assert_eq!(
        node.last_body(Method::Post, "/bolt11/pay"),
        Some(json!({ "invoice": "lnbcrt10u1example", "amount_msat": 25_000 }))
    );
    Ok(())
}

#[tokio::test]
async fn test_unexpected_response_shape() -> Result<()> {
    let node = MockTransport::new("alice");
    node.get("/balances", json!({ "total": "lots" }));

    let err = NodeClient::new(node.clone()).get_balances().await.unwrap_err();
    assert!(matches!(err, Error::RemoteCallFailed { ref path, .. } if path == "/balances"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_online() -> Result<()> {
    let node = node_with_status("alice");
    node.push(Method::Get, "/channels", Reply::Fail("connection refused".into()))
        .push(Method::Get, "/channels", Reply::Fail("connection refused".into()))
        .get("/channels", json!([]));

    NodeClient::new(node.clone())
        .wait_until_online(Duration::from_secs(3), Duration::from_secs(120))
        .await?;
    assert_eq!(node.count(Method::Get, "/channels"), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_wait_until_online_times_out() -> Result<()> {
    let node = MockTransport::new("alice");
    node.on(Method::Get, "/node_id", Reply::Fail("connection refused".into()))
        .get("/status", json!({ "is_running": true, "best_block_height": 1 }))
        .get("/channels", json!([]));

    let err = NodeClient::new(node.clone())
        .wait_until_online(Duration::from_secs(3), Duration::from_secs(10))
        .await
        .unwrap_err();
    match err {
        Error::Timeout { last_error, .. } => {
            assert_eq!(last_error, "GET /node_id failed: connection refused");
        }
        other => panic!("expected timeout, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected_before_any_request() -> Result<()> {
    let node = MockTransport::new("alice");
    node.post("/bolt11/receive", json!({ "invoice": "lnbcrt1example" }))
        .post("/bolt11/pay", json!({}));
    let client = NodeClient::new(node.clone());

    let too_big = u64::MAX / 1000 + 1;
    let err = client.create_invoice(too_big, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAmount(n) if n == too_big));

    let err = client.pay_invoice("lnbcrt1example", Some(u64::MAX / 100)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidAmount(_)));
    assert!(node.calls().is_empty());

    // The largest convertible amount still goes through.
    client.create_invoice(u64::MAX / 1000, None).await?;
    assert_eq!(
        node.last_body(Method::Post, "/bolt11/receive").and_then(|b| b["amount_msat"].as_u64()),
        Some(u64::MAX / 1000 * 1000)
    );
    Ok(())
}
