//! WebSocket endpoint for live status updates.
//!
//! After the upgrade the connection is registered with the broadcaster
//! and immediately receives a `queue_update` snapshot, so a new client's
//! view is never stale-empty. No client-to-server messages are required;
//! inbound frames are drained only to detect disconnect promptly.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::AppState;
use crate::broadcast::{Broadcaster, SubscriberId};
use crate::error::Result;
use crate::event::ClientEvent;
use crate::queue::ArtQueue;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Push the connect-time snapshot: exactly one `queue_update` reflecting
/// the queue state at the moment the subscriber connected.
pub async fn send_queue_snapshot(
    queue: &ArtQueue,
    broadcaster: &Broadcaster,
    id: SubscriberId,
) -> Result<()> {
    let counts = queue.counts().await?;
    broadcaster.send_to(id, &ClientEvent::queue_update(counts)).await;
    Ok(())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber_id, mut rx) = state.broadcaster.subscribe().await;
    info!(subscriber_id = %subscriber_id, "live-update client connected");

    if let Err(e) = send_queue_snapshot(&state.queue, &state.broadcaster, subscriber_id).await {
        warn!("initial queue snapshot failed: {e}");
    }

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward broadcaster events to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Receiver loop: drain inbound frames until the client goes away.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.broadcaster.unsubscribe(subscriber_id).await;
    send_task.abort();
    debug!(subscriber_id = %subscriber_id, "live-update client disconnected");
}
