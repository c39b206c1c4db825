//! Per-connection write pump.
//!
//! Registers the connection with the hub, then forwards queued payloads to
//! the socket until either side goes away. The hub closing the delivery
//! channel (eviction or shutdown) ends the connection with a close frame.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::HubConfig;
use crate::domain::ClientHandle;
use crate::hub::Hub;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Forwards every payload the hub queues for this client.
/// - Sends a ping every [`HubConfig::ping_interval`].
/// - Drains client frames; close, EOF or a read error ends the loop.
///
/// The client is unregistered on the way out, which is a no-op when the
/// hub already evicted it.
pub async fn run_connection(
    socket: WebSocket,
    hub: Hub,
    user_id: Option<String>,
    config: Arc<HubConfig>,
) {
    let (handle, mut outbound) = match user_id {
        Some(user_id) => ClientHandle::new(user_id, config.client_buffer_capacity),
        None => ClientHandle::anonymous(config.client_buffer_capacity),
    };
    hub.register(handle);
    let client_id = outbound.id();

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut ping = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Payload queued by the hub
            payload = outbound.recv() => {
                let Some(payload) = payload else {
                    tracing::debug!(%client_id, "delivery channel closed by hub");
                    let frame = CloseFrame {
                        code: close_code::AGAIN,
                        reason: "disconnected by server".into(),
                    };
                    let _ = ws_tx.send(Message::Close(Some(frame))).await;
                    break;
                };
                if ws_tx.send(to_message(payload)).await.is_err() {
                    break;
                }
            }
            // Keep-alive
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::debug!(%client_id, error = %err, "ws read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unregister(client_id);
    tracing::debug!(%client_id, "ws connection closed");
}

/// Envelopes are JSON and go out as text frames; anything else raw.
///
/// Both frame kinds share the payload's buffer.
fn to_message(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}
