//! `/ws/dlq-events`: bridges the event bus to a WebSocket connection (§6, §4.15).
//!
//! Server → client only. One `INFO` frame on connect, then every bus event
//! as a JSON text frame until the socket closes or shutdown fires.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::broadcast;

use crate::app::AppState;
use crate::store::BusEvent;

pub async fn upgrade(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(mut socket: WebSocket, state: Arc<AppState>) {
    let mut shutdown = state.shutdown.subscribe();
    let mut events = state.bus.subscribe();

    if send_event(&mut socket, &BusEvent::info("connected")).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                // Client frames are ignored; only a close ends the loop early.
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

async fn send_event(socket: &mut WebSocket, event: &BusEvent) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(json.into())).await
}
