//! End-to-end tests against a listening server with real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use kaab_assistant::{EngineConfig, ResponseCache, ResponseEngine};
use kaab_core::memory::{MemoryEntityStore, MemoryNotificationStore};
use kaab_core::traits::{EntityKind, EntityRecord};
use kaab_core::{ChannelId, UserId};
use kaab_server::{KaabServer, ServerConfig};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct Harness {
    server: KaabServer,
    base: String,
    ws_url: String,
}

async fn boot_server() -> Harness {
    let store = MemoryEntityStore::new();
    for tag in ["design", "design", "math"] {
        store.insert(EntityKind::Post, EntityRecord::tagged(tag));
    }
    let engine = Arc::new(ResponseEngine::new(
        Arc::new(ResponseCache::default()),
        Arc::new(store),
        None,
        EngineConfig::default(),
    ));
    let server = KaabServer::new(
        ServerConfig::default(),
        engine,
        Arc::new(MemoryNotificationStore::new()),
    );
    let (addr, _handle) = server.listen().await.unwrap();
    Harness {
        server,
        base: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
    }
}

async fn connect(h: &Harness) -> (WsStream, String) {
    let (mut ws, _) = timeout(TIMEOUT, connect_async(h.ws_url.as_str()))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    let hello = next_event(&mut ws).await;
    assert_eq!(hello["event"], "connectionEstablished");
    let channel = hello["data"]["channelId"].as_str().unwrap().to_owned();
    (ws, channel)
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn next_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn next_named(ws: &mut WsStream, name: &str) -> Value {
    loop {
        let ev = next_event(ws).await;
        if ev["event"] == name {
            return ev;
        }
    }
}

/// Identify and wait for our own online event. Every frame sent before this
/// one has been handled once it returns.
async fn identify(ws: &mut WsStream, user: &str) {
    send(ws, json!({"event": "identify", "data": {"userId": user}})).await;
    loop {
        let ev = next_named(ws, "presenceChanged").await;
        if ev["data"]["userId"] == user {
            return;
        }
    }
}

async fn wait_for_connections(h: &Harness, n: usize) {
    let broker = h.server.dispatcher().broker().clone();
    timeout(TIMEOUT, async {
        while broker.connection_count().await != n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection count never settled");
}

#[tokio::test]
async fn connection_established_carries_channel_id() {
    let h = boot_server().await;
    let (_ws, channel) = connect(&h).await;
    assert!(channel.starts_with("conn_"), "got: {channel}");
}

#[tokio::test]
async fn identify_broadcasts_presence_to_others() {
    let h = boot_server().await;
    let (mut observer, _) = connect(&h).await;
    let (mut client, channel) = connect(&h).await;

    identify(&mut client, "u1").await;

    let ev = next_named(&mut observer, "presenceChanged").await;
    assert_eq!(ev["data"], json!({"userId": "u1", "status": "online"}));
    assert_eq!(
        h.server.dispatcher().registry().lookup(&UserId::from_raw("u1")),
        Some(ChannelId::from_raw(channel))
    );
}

#[tokio::test]
async fn joined_room_receives_saved_messages() {
    let h = boot_server().await;
    let (mut member, _) = connect(&h).await;
    let (mut outsider, _) = connect(&h).await;
    send(&mut member, json!({"event": "joinRoom", "data": {"chatId": "42"}})).await;
    identify(&mut member, "u1").await;
    send(&mut outsider, json!({"event": "joinQuestions"})).await;
    identify(&mut outsider, "u2").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/internal/messages", h.base))
        .json(&json!({"thread": {"kind": "chat", "id": "42"}, "message": {"text": "hello"}}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["delivered"], 1);

    let ev = next_named(&mut member, "newMessage").await;
    assert_eq!(ev["data"]["room"], "chat_42");
    assert_eq!(ev["data"]["message"]["text"], "hello");

    // Published after the message, so the outsider would have seen that first.
    let _ = h.server
        .dispatcher()
        .question_posted(json!({"title": "marker"}))
        .await;
    let ev = next_event(&mut outsider).await;
    assert_eq!(ev["event"], "newQuestion");
}

#[tokio::test]
async fn superseded_connection_close_emits_no_offline() {
    let h = boot_server().await;
    let (mut observer, _) = connect(&h).await;
    let (mut first, _) = connect(&h).await;
    let (mut second, second_channel) = connect(&h).await;
    identify(&mut first, "u1").await;
    identify(&mut second, "u1").await;

    first.close(None).await.unwrap();
    wait_for_connections(&h, 2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (mut marker, _) = connect(&h).await;
    identify(&mut marker, "u3").await;

    // Skip the two online events for u1; the next presence change must be u3.
    for _ in 0..2 {
        let ev = next_named(&mut observer, "presenceChanged").await;
        assert_eq!(ev["data"]["userId"], "u1");
        assert_eq!(ev["data"]["status"], "online");
    }
    let ev = next_named(&mut observer, "presenceChanged").await;
    assert_eq!(ev["data"], json!({"userId": "u3", "status": "online"}));
    assert_eq!(
        h.server.dispatcher().registry().lookup(&UserId::from_raw("u1")),
        Some(ChannelId::from_raw(second_channel))
    );
}

#[tokio::test]
async fn closing_authoritative_connection_emits_offline() {
    let h = boot_server().await;
    let (mut observer, _) = connect(&h).await;
    let (mut client, _) = connect(&h).await;
    identify(&mut client, "u1").await;
    let _ = next_named(&mut observer, "presenceChanged").await;

    client.close(None).await.unwrap();

    let ev = next_named(&mut observer, "presenceChanged").await;
    assert_eq!(ev["data"], json!({"userId": "u1", "status": "offline"}));
}

#[tokio::test]
async fn malformed_frames_keep_the_connection_open() {
    let h = boot_server().await;
    let (mut ws, _) = connect(&h).await;

    ws.send(Message::text("not json".to_owned())).await.unwrap();
    send(&mut ws, json!({"event": "joinRoom", "data": {}})).await;
    send(&mut ws, json!({"event": "fly", "data": {}})).await;

    identify(&mut ws, "u9").await;
    assert_eq!(h.server.dispatcher().registry().online_count(), 1);
}

#[tokio::test]
async fn notification_reaches_online_recipient() {
    let h = boot_server().await;
    let (mut ws, _) = connect(&h).await;
    identify(&mut ws, "u1").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/internal/notifications", h.base))
        .json(&json!({"recipient": "u1", "sender": "u2", "type": "answer", "content": "New answer"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["delivered"], true);

    let ev = next_named(&mut ws, "newNotification").await;
    assert_eq!(ev["data"]["notification"]["content"], "New answer");
    assert_eq!(ev["data"]["notification"]["read"], false);
}

#[tokio::test]
async fn chatbot_over_http() {
    let h = boot_server().await;
    let resp = reqwest::Client::new()
        .post(format!("{}/api/chatbot", h.base))
        .json(&json!({"messages": [{"role": "user", "text": "What categories of posts are there?"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    let text = body["response"].as_str().unwrap();
    assert!(text.contains("design"), "got: {text}");
    assert!(text.contains("math"), "got: {text}");
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let h = boot_server().await;
    let (mut ws, _) = connect(&h).await;
    h.server.shutdown().shutdown();

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "session did not close on shutdown");
}
