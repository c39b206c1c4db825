//! Axum WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Identity token for targeted delivery. Connections without one are
    /// addressable only by their own client id.
    pub user_id: Option<String>,
}

/// `GET /ws?user_id=...` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let config = Arc::clone(&state.config);
    let hub = state.hub.clone();
    let user_id = params.user_id.filter(|id| !id.is_empty());

    ws.max_message_size(config.max_message_bytes)
        .on_upgrade(move |socket| run_connection(socket, hub, user_id, config))
}
