//! Integration tests for the WebSocket bridge.
//!
//! These tests bind a real server on an ephemeral port, drive it with
//! tokio-tungstenite clients, and back it with the mock reader transport.

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tagbridge_core::constants::START_PAGE;
use tagbridge_core::{PresenceEvent, TagSerial};
use tagbridge_hardware::PresenceMonitor;
use tagbridge_hardware::mock::{MockTag, MockTransport, MockTransportHandle};
use tagbridge_network::{BridgeConfig, BridgeServer, CONNECTED_MESSAGE};
use tagbridge_rfid::{TagWriter, WriterConfig};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const READER: &str = "ACS ACR122U PICC Interface 00 00";
const WAIT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bind a bridge over `transport` and serve until the test ends.
async fn start_bridge(transport: Arc<MockTransport>) -> (SocketAddr, mpsc::Sender<PresenceEvent>) {
    let writer = Arc::new(TagWriter::new(transport, WriterConfig::default()).unwrap());
    let server = BridgeServer::bind(BridgeConfig::with_address("127.0.0.1", 0), writer)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();

    let (events_tx, events) = mpsc::channel(16);
    tokio::spawn(server.run(events));
    (addr, events_tx)
}

async fn bridge_with_reader() -> (SocketAddr, mpsc::Sender<PresenceEvent>, MockTransportHandle) {
    let (transport, handle) = MockTransport::with_reader(READER);
    let (addr, events) = start_bridge(Arc::new(transport)).await;
    (addr, events, handle)
}

/// Connect and consume the greeting.
async fn connect(addr: SocketAddr) -> (Client, Value) {
    let (mut client, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    let greeting = recv_json(&mut client).await;
    (client, greeting)
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::Text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn test_greeting_lists_readers() {
    let (addr, _events, _handle) = bridge_with_reader().await;

    let (_client, greeting) = connect(addr).await;
    assert_eq!(greeting["type"], "connected");
    assert_eq!(greeting["message"], CONNECTED_MESSAGE);
    assert_eq!(greeting["readers"], json!([{"name": READER, "index": 0}]));
}

#[tokio::test]
async fn test_ping_pong() {
    let (addr, _events, _handle) = bridge_with_reader().await;
    let (mut client, _) = connect(addr).await;

    send_json(&mut client, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut client).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn test_get_readers_reflects_changes() {
    let (addr, _events, handle) = bridge_with_reader().await;
    let (mut client, _) = connect(addr).await;

    handle.add_reader("Second Reader");
    send_json(&mut client, json!({"type": "get_readers"})).await;

    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], "readers_list");
    assert_eq!(
        reply["readers"],
        json!([{"name": READER, "index": 0}, {"name": "Second Reader", "index": 1}])
    );
}

#[tokio::test]
async fn test_write_tag_round_trip() {
    let (addr, _events, handle) = bridge_with_reader().await;
    handle
        .place_tag(READER, MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3]))
        .unwrap();
    let (mut client, _) = connect(addr).await;

    send_json(
        &mut client,
        json!({"type": "write_tag", "data": {"id": "x1"}, "request_id": "req-42"}),
    )
    .await;

    let reply = recv_json(&mut client).await;
    assert_eq!(
        reply,
        json!({
            "type": "write_result",
            "success": true,
            "message": "Tag NTAG written (11 bytes)",
            "request_id": "req-42",
            "bytes_written": 11,
            "pages_written": 6,
        })
    );

    let tag = handle.tag(READER).unwrap();
    let record = tagbridge_ndef::decode(tag.memory_from(START_PAGE)).unwrap();
    assert_eq!(record.text, r#"{"id":"x1"}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_write_tags_apply_one_at_a_time() {
    let (addr, _events, handle) = bridge_with_reader().await;
    handle
        .place_tag(READER, MockTag::ntag216(vec![0x04, 0xA1, 0xB2, 0xC3]))
        .unwrap();
    handle.set_latency(Duration::from_micros(200));

    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;
    let payload_a = json!({"fill": "a".repeat(700)});
    let payload_b = json!({"fill": "b".repeat(700)});

    tokio::join!(
        send_json(&mut a, json!({"type": "write_tag", "data": payload_a.clone(), "request_id": "a"})),
        send_json(&mut b, json!({"type": "write_tag", "data": payload_b.clone(), "request_id": "b"})),
    );
    let (reply_a, reply_b) = tokio::join!(recv_json(&mut a), recv_json(&mut b));
    assert_eq!(reply_a["success"], true, "{reply_a}");
    assert_eq!(reply_b["success"], true, "{reply_b}");
    assert_eq!(reply_a["request_id"], "a");
    assert_eq!(reply_b["request_id"], "b");

    let tag = handle.tag(READER).unwrap();
    let record = tagbridge_ndef::decode(tag.memory_from(START_PAGE)).unwrap();
    let on_tag: Value = serde_json::from_str(&record.text).unwrap();
    assert!(on_tag == payload_a || on_tag == payload_b, "{}", record.text);
}

#[tokio::test]
async fn test_write_tag_without_reader() {
    let (transport, _handle) = MockTransport::new();
    let (addr, _events) = start_bridge(Arc::new(transport)).await;
    let (mut client, greeting) = connect(addr).await;
    assert_eq!(greeting["readers"], json!([]));

    send_json(
        &mut client,
        json!({"type": "write_tag", "data": {"id": "x1"}, "request_id": "r1"}),
    )
    .await;

    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], "write_result");
    assert_eq!(reply["success"], false);
    assert_eq!(reply["request_id"], "r1");
    assert!(reply["message"].as_str().unwrap().contains("reader"));
}

#[tokio::test]
async fn test_non_string_request_id_gets_reply() {
    let (addr, _events, handle) = bridge_with_reader().await;
    handle
        .place_tag(READER, MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3]))
        .unwrap();
    let (mut client, _) = connect(addr).await;

    send_json(
        &mut client,
        json!({"type": "write_tag", "data": {"id": "x1"}, "request_id": 7}),
    )
    .await;

    let reply = recv_json(&mut client).await;
    assert_eq!(reply["type"], "write_result");
    assert_eq!(reply["success"], true);
    assert_eq!(reply["request_id"], json!(7));
}

#[tokio::test]
async fn test_write_tag_too_large() {
    let (addr, _events, handle) = bridge_with_reader().await;
    handle
        .place_tag(READER, MockTag::ntag213(vec![0x04, 0xA1, 0xB2, 0xC3]))
        .unwrap();
    let (mut client, _) = connect(addr).await;

    send_json(
        &mut client,
        json!({"type": "write_tag", "data": {"blob": "x".repeat(200)}, "request_id": "big"}),
    )
    .await;

    let reply = recv_json(&mut client).await;
    assert_eq!(reply["success"], false);
    assert!(reply["message"].as_str().unwrap().contains("144"));
    assert_eq!(handle.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_message_ignored() {
    let (addr, _events, _handle) = bridge_with_reader().await;
    let (mut noisy, _) = connect(addr).await;
    let (mut other, _) = connect(addr).await;

    send_json(&mut noisy, json!({"type": "unknown_cmd"})).await;
    noisy
        .send(Message::Text("not json at all".to_string()))
        .await
        .unwrap();
    noisy.send(Message::Binary(vec![1, 2, 3])).await.unwrap();

    // no reply to the junk: the next frame is the pong
    send_json(&mut noisy, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut noisy).await["type"], "pong");

    send_json(&mut other, json!({"type": "ping"})).await;
    assert_eq!(recv_json(&mut other).await["type"], "pong");
}

#[tokio::test]
async fn test_presence_broadcast_to_all_peers() {
    let (addr, events, _handle) = bridge_with_reader().await;
    let (mut a, _) = connect(addr).await;
    let (mut b, _) = connect(addr).await;

    let serial = TagSerial::from_bytes(&[0x04, 0xA1, 0xB2]).unwrap();
    events
        .send(PresenceEvent::detected(serial, READER))
        .await
        .unwrap();
    events.send(PresenceEvent::removed()).await.unwrap();

    for client in [&mut a, &mut b] {
        let detected = recv_json(client).await;
        assert_eq!(detected["type"], "nfc_detected");
        assert_eq!(detected["serialNumber"], "04:A1:B2");
        assert_eq!(detected["reader"], READER);

        let removed = recv_json(client).await;
        assert_eq!(removed["type"], "nfc_removed");
        assert!(removed["timestamp"].is_string());
    }
}

#[tokio::test]
async fn test_departed_peer_does_not_block_broadcast() {
    let (addr, events, _handle) = bridge_with_reader().await;
    let (mut stays, _) = connect(addr).await;
    let (mut leaves, _) = connect(addr).await;

    leaves.close(None).await.unwrap();
    drop(leaves);

    events.send(PresenceEvent::removed()).await.unwrap();
    assert_eq!(recv_json(&mut stays).await["type"], "nfc_removed");
}

#[tokio::test]
async fn test_monitor_to_browser() {
    let (transport, handle) = MockTransport::with_reader(READER);
    let transport = Arc::new(transport);

    let monitor = PresenceMonitor::new(Arc::clone(&transport)).start().unwrap();
    let (presence, _monitor_task) = monitor.into_parts();

    let writer = Arc::new(TagWriter::new(transport, WriterConfig::default()).unwrap());
    let server = BridgeServer::bind(BridgeConfig::with_address("127.0.0.1", 0), writer)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run(presence));

    let (mut client, _) = connect(addr).await;

    handle
        .insert_tag(READER, MockTag::ntag215(vec![0x04, 0x11, 0x22, 0x33]))
        .await
        .unwrap();
    let detected = recv_json(&mut client).await;
    assert_eq!(detected["type"], "nfc_detected");
    assert_eq!(detected["serialNumber"], "04:11:22:33");

    send_json(
        &mut client,
        json!({"type": "write_tag", "data": {"id": "x1"}, "request_id": "w"}),
    )
    .await;
    let written = recv_json(&mut client).await;
    assert_eq!(written["type"], "write_result");
    assert_eq!(written["success"], true);

    handle.remove_tag(READER).await.unwrap();
    assert_eq!(recv_json(&mut client).await["type"], "nfc_removed");
}

#[tokio::test]
async fn test_bind_conflict_reported() {
    let (transport, _handle) = MockTransport::with_reader(READER);
    let transport = Arc::new(transport);
    let writer = Arc::new(TagWriter::new(transport, WriterConfig::default()).unwrap());

    let first = BridgeServer::bind(BridgeConfig::with_address("127.0.0.1", 0), Arc::clone(&writer))
        .await
        .unwrap();
    let port = first.local_addr().unwrap().port();

    let second = BridgeServer::bind(BridgeConfig::with_address("127.0.0.1", port), writer).await;
    assert!(matches!(
        second,
        Err(tagbridge_network::BridgeError::BindFailed { .. })
    ));
}
