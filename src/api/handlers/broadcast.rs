//! Producer endpoints: publish to everyone or to one user's sessions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{BroadcastAccepted, BroadcastRequest};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, HubError};

/// `POST /broadcast` — Publish a message to every connected client.
///
/// # Errors
///
/// Returns [`HubError::InvalidRequest`] for an empty message type and
/// [`HubError::HubStopped`] or [`HubError::Overloaded`] when the hub
/// cannot take the message.
#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Broadcast",
    summary = "Broadcast to all clients",
    description = "Wraps the body in a `{type, data}` envelope and queues it for every connected client. Clients whose buffer is full are disconnected.",
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Message queued for fan-out", body = BroadcastAccepted),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 503, description = "Hub is shutting down or overloaded", body = ErrorResponse),
    )
)]
pub async fn broadcast_all(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, HubError> {
    validate(&req)?;
    state.hub.broadcast(&req.message_type, &req.data)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastAccepted {
            accepted: true,
            message_type: req.message_type,
            user_id: None,
        }),
    ))
}

/// `POST /users/{user_id}/broadcast` — Publish to every session of one user.
///
/// # Errors
///
/// Returns [`HubError::InvalidRequest`] for an empty message type or user
/// id, and [`HubError::HubStopped`] or [`HubError::Overloaded`] when the
/// hub cannot take the message.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/broadcast",
    tag = "Broadcast",
    summary = "Broadcast to one user",
    description = "Queues the envelope for every client registered under `user_id`. Succeeds even when the user has no open connection.",
    params(
        ("user_id" = String, Path, description = "Identity token the clients connected with"),
    ),
    request_body = BroadcastRequest,
    responses(
        (status = 202, description = "Message queued for fan-out", body = BroadcastAccepted),
        (status = 400, description = "Invalid message", body = ErrorResponse),
        (status = 503, description = "Hub is shutting down or overloaded", body = ErrorResponse),
    )
)]
pub async fn broadcast_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> Result<impl IntoResponse, HubError> {
    validate(&req)?;
    if user_id.trim().is_empty() {
        return Err(HubError::InvalidRequest(
            "user id must not be empty".to_string(),
        ));
    }
    state
        .hub
        .broadcast_to_user(&user_id, &req.message_type, &req.data)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastAccepted {
            accepted: true,
            message_type: req.message_type,
            user_id: Some(user_id),
        }),
    ))
}

fn validate(req: &BroadcastRequest) -> Result<(), HubError> {
    if req.message_type.trim().is_empty() {
        return Err(HubError::InvalidRequest(
            "message type must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Broadcast routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast_all))
        .route("/users/{user_id}/broadcast", post(broadcast_user))
}
