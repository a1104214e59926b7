//! End-to-end WebSocket relay tests against a real listener.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use cmpsr_protocol::StatusPayload;

mod common;
use common::{RecordingExecutor, online, spawn_server, test_app};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

async fn connect(addr: std::net::SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket connect");
    ws
}

async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let message = timeout(EVENT_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).expect("frame is not valid JSON");
        }
    }
}

/// Next frame that is not a status broadcast.
async fn next_cycle_event(ws: &mut WsClient) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["type"] != "status-update" {
            return event;
        }
    }
}

async fn submit(ws: &mut WsClient, command: &str) {
    let frame = json!({ "type": "execute-command", "command": command }).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

#[tokio::test]
async fn status_snapshot_is_pushed_on_connect() {
    let addr = spawn_server(test_app(online(), RecordingExecutor::instant(true))).await;
    let mut ws = connect(addr).await;

    let first = next_event(&mut ws).await;
    assert_eq!(first["type"], "status-update");
    assert_eq!(first["cursor"], true);
    assert_eq!(first["composer"], true);
}

#[tokio::test]
async fn command_cycle_acks_then_completes() {
    let executor = RecordingExecutor::instant(true);
    let addr = spawn_server(test_app(online(), executor.clone())).await;
    let mut ws = connect(addr).await;

    submit(&mut ws, "hello \"world\"").await;

    let ack = next_cycle_event(&mut ws).await;
    assert_eq!(ack["type"], "command-output");
    assert_eq!(ack["line"], "command delivered to the composer");

    let outcome = next_cycle_event(&mut ws).await;
    assert_eq!(outcome["type"], "command-complete");
    assert_eq!(outcome["exit_code"], 0);

    // One activation, one delivery; the delivered text is escaped so the
    // embedded quotes cannot break the script literal.
    let scripts = executor.scripts.lock().unwrap();
    assert_eq!(scripts.len(), 2);
    assert!(scripts[0].contains("activate"));
    assert!(scripts[1].contains(r#"keystroke "hello \"world\"""#));
}

#[tokio::test]
async fn absent_process_reports_error_without_running_actions() {
    let executor = RecordingExecutor::instant(true);
    let addr = spawn_server(test_app(StatusPayload::offline(), executor.clone())).await;
    let mut ws = connect(addr).await;

    submit(&mut ws, "hello").await;

    let error = next_cycle_event(&mut ws).await;
    assert_eq!(error["type"], "command-error");
    assert!(
        error["message"].as_str().unwrap().contains("not running"),
        "got: {error}"
    );

    let outcome = next_cycle_event(&mut ws).await;
    assert_eq!(outcome["type"], "command-complete");
    assert_eq!(outcome["exit_code"], 1);

    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn second_command_is_rejected_while_first_is_in_flight() {
    let barrier = Arc::new(Notify::new());
    let executor = RecordingExecutor::parked(barrier.clone());
    let addr = spawn_server(test_app(online(), executor.clone())).await;
    let mut ws = connect(addr).await;

    submit(&mut ws, "first").await;
    executor.wait_for_calls(1).await;

    submit(&mut ws, "second").await;
    let rejection = next_cycle_event(&mut ws).await;
    assert_eq!(rejection["type"], "command-error");
    assert!(
        rejection["message"].as_str().unwrap().contains("in flight"),
        "got: {rejection}"
    );

    // The first command is unaffected by the rejection.
    barrier.notify_one();
    executor.wait_for_calls(2).await;
    barrier.notify_one();

    let ack = next_cycle_event(&mut ws).await;
    assert_eq!(ack["type"], "command-output");
    let outcome = next_cycle_event(&mut ws).await;
    assert_eq!(outcome["exit_code"], 0);
}

#[tokio::test]
async fn failed_activation_aborts_the_cycle() {
    let executor = RecordingExecutor::instant(false);
    let addr = spawn_server(test_app(online(), executor.clone())).await;
    let mut ws = connect(addr).await;

    submit(&mut ws, "hello").await;

    let error = next_cycle_event(&mut ws).await;
    assert_eq!(error["type"], "command-error");
    assert!(
        error["message"].as_str().unwrap().contains("foreground"),
        "got: {error}"
    );

    let outcome = next_cycle_event(&mut ws).await;
    assert_eq!(outcome["exit_code"], 1);

    // Full retry budget spent, delivery never attempted.
    assert_eq!(executor.call_count(), 3);
}

#[tokio::test]
async fn malformed_frames_are_reported_and_ignored() {
    let addr = spawn_server(test_app(online(), RecordingExecutor::instant(true))).await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("not even json".to_string().into()))
        .await
        .unwrap();

    let error = next_cycle_event(&mut ws).await;
    assert_eq!(error["type"], "command-error");
    assert_eq!(error["message"], "unrecognized message");

    // The session still accepts a well-formed command afterwards.
    submit(&mut ws, "hello").await;
    let ack = next_cycle_event(&mut ws).await;
    assert_eq!(ack["type"], "command-output");
}
