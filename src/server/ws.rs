use super::handlers::AppState;
use crate::gateway::Bridge;
use axum::{
    extract::{State, WebSocketUpgrade, ws::WebSocket},
    response::Response,
};
use futures::StreamExt;
use tracing::{error, info};

/// Upgrades `GET /ws` to a WebSocket and hands the socket to a new bridge.
///
/// The `Origin` header is deliberately not checked: any browser origin may connect.
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_bytes = state.bridge.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_failed_upgrade(|e| error!("Failed to upgrade connection: {}", e))
        .on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: AppState) {
    let bridge = Bridge::new(state.upstream.clone(), state.bridge.clone());
    let connection_id = bridge.connection_id().to_string();
    let (writer, reader) = socket.split();

    match bridge.run(reader, writer, state.shutdown.signal()).await {
        Ok(final_state) => info!(%connection_id, "Connection finished in state {:?}", final_state),
        Err(e) => error!(%connection_id, "Connection bridge failed: {}", e),
    }
}
