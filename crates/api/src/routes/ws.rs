//! WebSocket endpoint streaming order notifications.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use order_store::OrderRepository;
use tokio::time::{Instant, interval_at};

use super::orders::AppState;

/// GET /ws/orders — upgrade to a notification stream.
pub async fn subscribe<R: OrderRepository + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<R>>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket<R: OrderRepository + 'static>(socket: WebSocket, state: Arc<AppState<R>>) {
    let (session, mut frames) = state.hub.open_session();
    let session_id = state.hub.register(session).await;
    let (mut sink, mut incoming) = socket.split();

    let period = state.heartbeat;
    let mut heartbeat = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            frame = frames.recv() => {
                // None means the hub dropped this session
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(Utf8Bytes::from(&*frame))).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unregister(session_id).await;
    tracing::debug!(%session_id, "websocket closed");
}
