//! HTTP server assembly and lifecycle.

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::HubConfig;
use crate::hub::Hub;
use crate::ws::handler::ws_handler;

/// Builds the router serving REST, WebSocket and (optionally) Swagger UI.
pub fn build_app(state: AppState) -> Router {
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the hub and serves until `shutdown` resolves.
///
/// On shutdown the hub closes every client channel, which makes each open
/// WebSocket send a close frame, and the dispatch loop is awaited before
/// returning.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(listener: TcpListener, config: HubConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (hub, dispatch) = Hub::start_with_backlog(config.broadcast_backlog);
    let app = build_app(AppState::new(hub.clone(), config));

    let stopping = hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            stopping.shutdown();
        })
        .await?;

    hub.shutdown();
    dispatch.await?;
    tracing::info!("server stopped");
    Ok(())
}
