use axum::extract::ws::Message;
use chat_gateway::{
    config::BridgeConfig,
    gateway::{Bridge, ConnectionState},
    server::Shutdown,
    upstream::ChatCoreClient,
};
use futures::{SinkExt, StreamExt, channel::mpsc};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

pub const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// A bridge running over in-memory channels instead of a socket.
pub struct TestConnection {
    pub inbound: mpsc::UnboundedSender<Result<Message, axum::Error>>,
    pub outbound: mpsc::UnboundedReceiver<Message>,
    pub shutdown: Arc<Shutdown>,
    pub handle: JoinHandle<chat_gateway::Result<ConnectionState>>,
}

pub fn create_test_bridge_config() -> BridgeConfig {
    BridgeConfig {
        max_in_flight: 64,
        unit_timeout_secs: 5,
        max_message_bytes: 64 * 1024,
        write_timeout_secs: 2,
    }
}

pub fn spawn_bridge(upstream: Arc<dyn ChatCoreClient>, config: BridgeConfig) -> TestConnection {
    let (inbound, reader) = mpsc::unbounded::<Result<Message, axum::Error>>();
    let (writer, outbound) = mpsc::unbounded::<Message>();
    let writer = writer.sink_map_err(axum::Error::new);
    let shutdown = Arc::new(Shutdown::new());

    let bridge = Bridge::new(upstream, config);
    let handle = tokio::spawn(bridge.run(reader, writer, shutdown.signal()));

    TestConnection {
        inbound,
        outbound,
        shutdown,
        handle,
    }
}

impl TestConnection {
    pub fn send_text(&self, text: &str) {
        self.inbound
            .unbounded_send(Ok(Message::Text(text.to_string())))
            .expect("bridge stopped reading");
    }

    pub fn send_message(&self, message: Message) {
        self.inbound
            .unbounded_send(Ok(message))
            .expect("bridge stopped reading");
    }

    pub fn send_read_error(&self) {
        let error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        self.inbound
            .unbounded_send(Err(axum::Error::new(error)))
            .expect("bridge stopped reading");
    }

    /// Next outbound frame parsed as JSON. Panics after [`FRAME_TIMEOUT`].
    pub async fn next_json(&mut self) -> Value {
        let message = tokio::time::timeout(FRAME_TIMEOUT, self.outbound.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed before a frame arrived");
        parse_frame(message)
    }

    pub async fn next_n_json(&mut self, n: usize) -> Vec<Value> {
        let mut frames = Vec::with_capacity(n);
        for _ in 0..n {
            frames.push(self.next_json().await);
        }
        frames
    }

    /// Asserts nothing is written within `window`.
    pub async fn assert_no_frame(&mut self, window: Duration) {
        if let Ok(frame) = tokio::time::timeout(window, self.outbound.next()).await {
            panic!("unexpected frame: {frame:?}");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Peer hangs up: the inbound stream ends.
    pub async fn close(self) -> (ConnectionState, Vec<Value>) {
        let TestConnection {
            inbound,
            outbound,
            shutdown: _shutdown,
            handle,
        } = self;
        drop(inbound);

        let state = tokio::time::timeout(FRAME_TIMEOUT, handle)
            .await
            .expect("bridge did not finish")
            .expect("bridge task panicked")
            .expect("bridge returned an error");

        let rest: Vec<Value> = outbound.map(parse_frame).collect().await;
        (state, rest)
    }
}

pub fn parse_frame(message: Message) -> Value {
    match message {
        Message::Text(text) => serde_json::from_str(&text).expect("frame is not valid JSON"),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

pub fn chat_frame(conversation_id: &str, content: &str) -> String {
    serde_json::json!({ "conversationId": conversation_id, "content": content }).to_string()
}

pub fn error_text(frame: &Value) -> Option<&str> {
    (frame["type"] == "error").then(|| frame["error"].as_str()).flatten()
}
