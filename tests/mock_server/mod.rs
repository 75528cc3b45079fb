//! Scripted WebSocket mock of the DashScope inference endpoint.
//!
//! Each test spawns a single-connection server with its own handler and
//! points the client at the returned `ws://` URL. Handlers assert on the
//! commands they receive; awaiting the returned task handle propagates
//! those assertions into the test.

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

pub type WsStream = WebSocketStream<TcpStream>;

/// Installs a per-test log subscriber once. Run with `RUST_LOG` and
/// `--nocapture` to watch the driver.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Binds an ephemeral port and serves exactly one connection with
/// `handler`. Returns the `ws://` URL and the server task handle.
pub async fn spawn_one<F, Fut>(handler: F) -> (String, tokio::task::JoinHandle<()>)
where
    F: FnOnce(WsStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock listener");
    let addr = listener.local_addr().expect("mock listener address");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept mock connection");
        let ws = accept_async(stream).await.expect("mock handshake");
        handler(ws).await;
    });

    (format!("ws://{addr}"), handle)
}

/// Reads the next command frame, skipping pings, and parses it as JSON.
pub async fn read_command(ws: &mut WsStream) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("command frame is JSON");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            other => panic!("expected a command frame, got {other:?}"),
        }
    }
}

/// Reads frames until the connection is gone. Replies to the client's
/// close handshake along the way.
pub async fn drain(ws: &mut WsStream) {
    while let Some(frame) = ws.next().await {
        if matches!(frame, Ok(Message::Close(_)) | Err(_)) {
            break;
        }
    }
}

pub fn event(value: Value) -> Message {
    Message::Text(value.to_string().into())
}

pub fn task_started(task_id: &str) -> Message {
    event(json!({
        "header": {"event": "task-started", "task_id": task_id},
        "payload": {}
    }))
}

pub fn result_generated(task_id: &str, request_uuid: &str, characters: u64) -> Message {
    event(json!({
        "header": {
            "event": "result-generated",
            "task_id": task_id,
            "attributes": {"request_uuid": request_uuid}
        },
        "payload": {"usage": {"characters": characters}}
    }))
}

pub fn task_finished(task_id: &str, characters: u64) -> Message {
    event(json!({
        "header": {"event": "task-finished", "task_id": task_id},
        "payload": {"usage": {"characters": characters}}
    }))
}

pub fn task_finished_with_words(task_id: &str, characters: u64, words: Value) -> Message {
    event(json!({
        "header": {"event": "task-finished", "task_id": task_id},
        "payload": {
            "usage": {"characters": characters},
            "output": {"sentence": {"words": words}}
        }
    }))
}

pub fn task_failed(task_id: &str, code: &str, message: &str) -> Message {
    event(json!({
        "header": {
            "event": "task-failed",
            "task_id": task_id,
            "error_code": code,
            "error_message": message
        },
        "payload": {}
    }))
}
