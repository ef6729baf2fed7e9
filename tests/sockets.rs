//! WebSocket channel tests.

use std::time::{Duration, Instant};

use app_bootstrap::{App, HandlerError, RunningApp, SocketEvent};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

mod common;
use common::test_config;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn echo(event: SocketEvent) -> Result<Option<Value>, HandlerError> {
    Ok(Some(event.payload))
}

/// Replies after a delay that shrinks with the payload, so a reordering
/// session would answer out of order.
async fn delayed(event: SocketEvent) -> Result<Option<Value>, HandlerError> {
    let n = event.payload.as_u64().unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(50 - n * 10)).await;
    Ok(Some(json!(n)))
}

async fn chatty(event: SocketEvent) -> Result<Option<Value>, HandlerError> {
    event.emit("progress", json!(1));
    event.emit("progress", json!(2));
    Ok(Some(json!("done")))
}

async fn reject(_event: SocketEvent) -> Result<Option<Value>, HandlerError> {
    Err(HandlerError::bad_request("path is required"))
}

async fn stall(_event: SocketEvent) -> Result<Option<Value>, HandlerError> {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(None)
}

async fn start(enabled: bool) -> RunningApp {
    let mut config = test_config();
    config.sockets.enabled = enabled;

    let mut app = App::new(config);
    app.register_socket("echo", echo)
        .unwrap()
        .register_socket("delayed", delayed)
        .unwrap()
        .register_socket("chatty", chatty)
        .unwrap()
        .register_socket("reject", reject)
        .unwrap()
        .register_socket("stall", stall)
        .unwrap();
    app.start().await.unwrap()
}

async fn connect(running: &RunningApp) -> Ws {
    let (ws, _) = connect_async(format!("ws://{}/ws", running.local_addr()))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if message.is_text() {
            return serde_json::from_str(message.to_text().unwrap()).unwrap();
        }
    }
}

#[tokio::test]
async fn test_echo_round_trip() {
    let running = start(true).await;
    let mut ws = connect(&running).await;

    send(&mut ws, json!({"type": "echo", "payload": {"hello": "world"}})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "echo", "payload": {"hello": "world"}})
    );

    ws.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_failures_answer_on_the_same_connection() {
    let running = start(true).await;
    let mut ws = connect(&running).await;

    send(&mut ws, json!({"type": "nope", "payload": 1})).await;
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["code"], "unknown_event");

    send(&mut ws, json!({"type": "reject"})).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({"type": "error", "error": {"code": "bad_request", "message": "path is required"}})
    );

    ws.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(next_json(&mut ws).await["error"]["code"], "bad_frame");

    // Connection survives every failure
    send(&mut ws, json!({"type": "echo", "payload": "still here"})).await;
    assert_eq!(next_json(&mut ws).await["payload"], "still here");

    ws.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_events_handled_in_arrival_order() {
    let running = start(true).await;
    let mut ws = connect(&running).await;

    for n in 0..5u64 {
        send(&mut ws, json!({"type": "delayed", "payload": n})).await;
    }
    for n in 0..5u64 {
        assert_eq!(next_json(&mut ws).await["payload"], n);
    }

    ws.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_emitted_frames_precede_reply() {
    let running = start(true).await;
    let mut ws = connect(&running).await;

    send(&mut ws, json!({"type": "chatty"})).await;
    assert_eq!(next_json(&mut ws).await, json!({"type": "progress", "payload": 1}));
    assert_eq!(next_json(&mut ws).await, json!({"type": "progress", "payload": 2}));
    assert_eq!(next_json(&mut ws).await, json!({"type": "chatty", "payload": "done"}));

    ws.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_connections_are_independent() {
    let running = start(true).await;
    let mut slow = connect(&running).await;
    let mut fast = connect(&running).await;

    send(&mut slow, json!({"type": "delayed", "payload": 0})).await;
    send(&mut fast, json!({"type": "echo", "payload": "quick"})).await;
    assert_eq!(next_json(&mut fast).await["payload"], "quick");
    assert_eq!(next_json(&mut slow).await["payload"], 0);

    slow.close(None).await.unwrap();
    fast.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_stop_closes_open_sockets() {
    let running = start(true).await;
    let mut ws = connect(&running).await;
    send(&mut ws, json!({"type": "echo", "payload": 1})).await;
    next_json(&mut ws).await;
    assert_eq!(running.socket_connections(), 1);

    let summary = running.stop().await;
    assert!(summary.drained);

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_binary_frame_rejected() {
    let running = start(true).await;
    let mut ws = connect(&running).await;

    ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
    let reply = next_json(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["error"]["code"], "bad_frame");

    send(&mut ws, json!({"type": "echo", "payload": "after binary"})).await;
    assert_eq!(next_json(&mut ws).await["payload"], "after binary");

    ws.close(None).await.unwrap();
    running.stop().await;
}

#[tokio::test]
async fn test_stop_abandons_stuck_socket_handler() {
    let running = start(true).await;
    let mut ws = connect(&running).await;
    send(&mut ws, json!({"type": "stall"})).await;

    // Let the frame reach the handler before stopping
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(running.socket_connections(), 1);

    let started = Instant::now();
    let summary = running.stop().await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!summary.drained);
    assert_eq!(summary.open_sockets, 0);
    assert!(summary.failed_teardowns.is_empty());
}

#[tokio::test]
async fn test_socket_path_not_mounted_when_disabled() {
    let running = start(false).await;
    assert!(connect_async(format!("ws://{}/ws", running.local_addr()))
        .await
        .is_err());
    running.stop().await;
}
