//! Membership inspection endpoint.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ClientDto, ClientListResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, HubError};

/// `GET /clients` — List connected clients.
///
/// # Errors
///
/// Returns [`HubError::HubStopped`] when the hub is shutting down.
#[utoipa::path(
    get,
    path = "/api/v1/clients",
    tag = "Clients",
    summary = "List connected clients",
    description = "Returns a consistent snapshot of the hub's membership set.",
    responses(
        (status = 200, description = "Connected clients", body = ClientListResponse),
        (status = 503, description = "Hub is shutting down", body = ErrorResponse),
    )
)]
pub async fn list_clients(State(state): State<AppState>) -> Result<impl IntoResponse, HubError> {
    let clients: Vec<ClientDto> = state
        .hub
        .members()
        .await?
        .into_iter()
        .map(ClientDto::from)
        .collect();

    Ok(Json(ClientListResponse {
        count: clients.len(),
        clients,
    }))
}

/// Client routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/clients", get(list_clients))
}
