//! WebSocket endpoint for the real-time channel
//!
//! Each connected viewer or controller holds one `GET /ws` connection. On
//! connect the client receives the server identity and the current timer
//! and tunnel snapshots, after which every observable state change arrives
//! as a broadcast frame. Inbound frames are handed to the command ingress.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::state::AppState;

use super::ingress::{dispatch, parse_command};
use super::protocol::Event;

/// Upgrade `GET /ws` and attach the client to the shared timer.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Drive one client connection: initial sync, then a select loop over the
/// event fan-out and the client's own frames.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("Client connected");

    // Subscribe before the initial snapshots so no update can fall between.
    let mut events_rx = state.subscribe();

    for event in state.connect_events().await {
        if send_event(&mut socket, &event).await.is_err() {
            debug!("Client disconnected during initial sync");
            return;
        }
    }

    loop {
        tokio::select! {
            result = events_rx.recv() => match result {
                Ok(event) => {
                    if send_event(&mut socket, &event).await.is_err() {
                        debug!("Client disconnected (send failed)");
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Client lagged behind the event stream");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed, shutting down connection");
                    return;
                }
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Some(command) = parse_command(&text) {
                        dispatch(&state, command);
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client disconnected");
                    return;
                }
                Some(Err(e)) => {
                    debug!("WebSocket error: {}", e);
                    return;
                }
                _ => {
                    // Ignore binary frames and pongs.
                }
            },
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            return Ok(());
        }
    };
    socket.send(Message::Text(json)).await
}
