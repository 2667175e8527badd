//! HTTP router construction.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use crate::{api, ws};

/// Worker sockets upgrade on `/`, `/ws` and any path not claimed by the
/// status endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/status", get(api::status))
        .route("/", get(ws::ws_upgrade))
        .route("/ws", get(ws::ws_upgrade))
        .fallback(ws::ws_upgrade)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
