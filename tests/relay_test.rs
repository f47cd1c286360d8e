/// In-process tests for the fan-out channel
/// The relay router runs on an ephemeral port; no MQTT broker is required
mod common;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use solar_relay::power::{Phase, PowerDelta};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(url: &str) -> Client {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_new_session_receives_latest_snapshot() {
    let server = common::spawn_server(10).await;

    server.hub.publish(PowerDelta::single(Phase::L0, 100.0)).await;
    server.hub.publish(PowerDelta::single(Phase::L0, -300.0)).await;
    server.hub.publish(PowerDelta::single(Phase::L1, 500.0)).await;

    let mut client = connect(&server.ws_url()).await;
    let snapshot = next_json(&mut client).await;

    assert_eq!(
        snapshot,
        json!({"type": "snapshot", "phase0": -300.0, "phase1": 500.0, "phase2": 0.0})
    );
}

#[tokio::test]
async fn test_updates_carry_only_changed_phase() {
    let server = common::spawn_server(10).await;
    let mut client = connect(&server.ws_url()).await;
    let _snapshot = next_json(&mut client).await;

    server.hub.publish(PowerDelta::single(Phase::L0, 10.0)).await;
    server.hub.publish(PowerDelta::single(Phase::L1, -20.0)).await;

    assert_eq!(next_json(&mut client).await, json!({"type": "update", "phase0": 10.0}));
    assert_eq!(next_json(&mut client).await, json!({"type": "update", "phase1": -20.0}));
}

#[tokio::test]
async fn test_every_session_receives_broadcast() {
    let server = common::spawn_server(10).await;
    let mut first = connect(&server.ws_url()).await;
    let mut second = connect(&server.ws_url()).await;
    next_json(&mut first).await;
    next_json(&mut second).await;

    server.hub.publish(PowerDelta::single(Phase::L2, 75.5)).await;

    let expected = json!({"type": "update", "phase2": 75.5});
    assert_eq!(next_json(&mut first).await, expected);
    assert_eq!(next_json(&mut second).await, expected);
}

#[tokio::test]
async fn test_ping_gets_pong() {
    let server = common::spawn_server(10).await;
    let mut client = connect(&server.ws_url()).await;
    next_json(&mut client).await;

    client
        .send(Message::text(r#"{"type":"ping"}"#))
        .await
        .unwrap();

    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "pong");
    assert!(reply["timestamp"].is_string());
}

#[tokio::test]
async fn test_unknown_client_message_gets_error() {
    let server = common::spawn_server(10).await;
    let mut client = connect(&server.ws_url()).await;
    next_json(&mut client).await;

    client
        .send(Message::text(r#"{"type":"subscribe"}"#))
        .await
        .unwrap();

    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["code"], "invalid_message");
}

#[tokio::test]
async fn test_disconnected_session_is_dropped() {
    let server = common::spawn_server(10).await;
    let mut client = connect(&server.ws_url()).await;
    next_json(&mut client).await;
    common::wait_for_sessions(&server.hub, 1).await;

    client.close(None).await.unwrap();
    drop(client);

    common::wait_for_sessions(&server.hub, 0).await;
    // Broadcasting with nobody connected still updates the snapshot
    server.hub.publish(PowerDelta::single(Phase::L0, 1.0)).await;
    assert_eq!(server.hub.snapshot().await.phase0, 1.0);
}

#[tokio::test]
async fn test_sessions_beyond_limit_are_rejected() {
    let server = common::spawn_server(1).await;
    let mut first = connect(&server.ws_url()).await;
    next_json(&mut first).await;

    let result = tokio_tungstenite::connect_async(server.ws_url()).await;
    match result {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 503);
        }
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let server = common::spawn_server(10).await;
    let mut client = connect(&server.ws_url()).await;
    next_json(&mut client).await;

    server.shutdown.send(true).unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for close");
    assert!(matches!(frame, Some(Ok(Message::Close(_))) | None));
}

#[tokio::test]
async fn test_shutdown_drains_sessions_after_close() {
    let server = common::spawn_server(10).await;
    let mut first = connect(&server.ws_url()).await;
    let mut second = connect(&server.ws_url()).await;
    next_json(&mut first).await;
    next_json(&mut second).await;
    assert_eq!(server.state.active_sessions(), 2);

    server.shutdown.send(true).unwrap();

    assert!(server.state.drain_sessions(Duration::from_secs(5)).await);
    assert_eq!(server.state.active_sessions(), 0);
    for client in [&mut first, &mut second] {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for close");
        assert!(matches!(frame, Some(Ok(Message::Close(_))) | None));
    }
}

#[tokio::test]
async fn test_root_document_is_served() {
    let server = common::spawn_server(10).await;

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("dashboard"));
}
