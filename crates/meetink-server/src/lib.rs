//! meetink WebSocket relay
//!
//! A dumb relay: every envelope a client sends is rebroadcast to the other sockets in its
//! room. Item mutations are also applied to an in-memory item list per room, which late
//! joiners fetch over HTTP to hydrate.
//!
//! ## Protocol
//!
//! Messages are JSON envelopes:
//! ```json
//! { "roomId": "room-id", "senderId": "uuid", "type": "join", "payload": {} }
//! { "roomId": "room-id", "senderId": "uuid", "type": "add_item", "payload": { ... } }
//! ```
//! The first message on a socket must be `join`. When a socket drops the relay sends
//! `user_left` with the sender id the socket joined with.

pub mod rooms;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use meetink_core::items::Item;
use meetink_core::sync::{BoardEvent, Envelope};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use rooms::{AppState, Relayed, RoomInfo};

/// Build the relay's router over shared state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .route("/rooms", get(list_rooms))
        .route("/rooms/{room}/items", get(room_items).delete(clear_room_items))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Index page
async fn index() -> &'static str {
    "meetink relay server - connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomInfo>> {
    Json(state.list())
}

async fn room_items(Path(room): Path<String>, State(state): State<Arc<AppState>>) -> Json<Vec<Item>> {
    Json(state.items(&room))
}

async fn clear_room_items(Path(room): Path<String>, State(state): State<Arc<AppState>>) -> StatusCode {
    if state.clear_items(&room) {
        info!("Cleared items of room {}", room);
    }
    StatusCode::NO_CONTENT
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let socket_id = Uuid::new_v4().to_string();
    info!("New connection: {}", socket_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<Relayed>> = None;

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(data))) => match binary_text(data) {
                        Some(text) => text,
                        None => {
                            warn!("Non-UTF-8 binary frame from {}", socket_id);
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue, // Ignore ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", socket_id, e);
                        break;
                    }
                };

                let envelope = match Envelope::from_json(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!("Invalid message from {}: {}", socket_id, e);
                        continue;
                    }
                };

                if let BoardEvent::Join { .. } = &envelope.event {
                    if let Some(old_room) = current_room.take() {
                        state.leave(&old_room, &socket_id);
                    }
                    let (rx, peer_count) = state.join(&envelope.room_id, &socket_id, &envelope.sender_id);
                    room_rx = Some(rx);
                    current_room = Some(envelope.room_id.clone());
                    info!(
                        "Peer {} ({}) joined room {} ({} peers)",
                        envelope.sender_id, socket_id, envelope.room_id, peer_count
                    );
                }

                match current_room.as_deref() {
                    Some(room) if room == envelope.room_id => {
                        state.relay(room, &socket_id, &envelope, text);
                    }
                    _ => debug!("Dropping {} from {} outside its room", envelope.event.name(), socket_id),
                }
            }

            // Handle broadcast messages from room
            msg = async {
                match &mut room_rx {
                    Some(rx) => Some(rx.recv().await),
                    None => {
                        // No room joined, just wait forever
                        std::future::pending::<Option<Result<Relayed, RecvError>>>().await
                    }
                }
            } => {
                match msg {
                    Some(Ok(relayed)) => {
                        // Don't echo back to sender
                        if relayed.from != socket_id
                            && sender.send(Message::Text(relayed.text.into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        warn!("Connection {} lagged, {} messages dropped", socket_id, skipped);
                    }
                    Some(Err(RecvError::Closed)) | None => room_rx = None,
                }
            }
        }
    }

    // Cleanup on disconnect
    if let Some(room) = current_room {
        state.leave(&room, &socket_id);
    }
    info!("Connection closed: {}", socket_id);
}

fn binary_text(data: Bytes) -> Option<String> {
    String::from_utf8(data.to_vec()).ok()
}
