//! WebSocket push of ledger changes

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::models::LedgerEvent;
use crate::services::EventLedger;

/// Subscribes before answering the handshake, so every change recorded after
/// the client sees the upgrade is delivered.
pub async fn ledger_socket(
    ws: WebSocketUpgrade,
    State(ledger): State<Arc<EventLedger>>,
) -> Response {
    let events = ledger.subscribe();
    ws.on_upgrade(move |socket| stream_ledger(socket, events))
}

/// Forwards every ledger change as a JSON text frame until the client goes
/// away. Incoming frames are ignored apart from close.
async fn stream_ledger(socket: WebSocket, mut events: broadcast::Receiver<LedgerEvent>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to encode ledger event");
                        continue;
                    }
                };

                if sender.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("websocket subscriber disconnected");
}
