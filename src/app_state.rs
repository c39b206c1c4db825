//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::HubConfig;
use crate::hub::Hub;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle onto the running dispatch loop.
    pub hub: Hub,
    /// Connection settings applied to every new WebSocket.
    pub config: Arc<HubConfig>,
}

impl AppState {
    /// Bundles a running hub with the configuration it serves under.
    #[must_use]
    pub fn new(hub: Hub, config: HubConfig) -> Self {
        Self {
            hub,
            config: Arc::new(config),
        }
    }
}
