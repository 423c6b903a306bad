//! WebSocket progress relay

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use mailchats_core::ProgressEvent;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::auth::AppState;

/// GET /ws
pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state))
}

fn encode(event: &ProgressEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            error!("Failed to encode progress event: {}", e);
            None
        }
    }
}

/// Forward hub events to one client until either side goes away
async fn relay(socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket client connected");
    // subscribe before greeting so nothing published in between is lost
    let mut events = state.hub.subscribe();
    let (mut sink, mut stream) = socket.split();

    let welcome = ProgressEvent::info("WebSocket connected to server");
    if let Some(msg) = encode(&welcome) {
        if sink.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Some(msg) = encode(&event) else { continue };
                    if let Err(e) = sink.send(msg).await {
                        debug!("WebSocket send failed: {}", e);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, dropped events");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    info!("WebSocket client disconnected");
}
