//! REST API layer: producer endpoints, membership inspection, health.
//!
//! Resource endpoints are mounted under `/api/v1`.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "fanout-hub", description = "WebSocket fan-out hub producer API"),
    paths(
        handlers::broadcast::broadcast_all,
        handlers::broadcast::broadcast_user,
        handlers::clients::list_clients,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::BroadcastRequest,
        dto::BroadcastAccepted,
        dto::ClientDto,
        dto::ClientListResponse,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Broadcast", description = "Publish messages to connected clients"),
        (name = "Clients", description = "Inspect connected clients"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
