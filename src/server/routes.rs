//! Router configuration for the control plane

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Creates the router with all control-plane routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/filters", put(handlers::update_filters))
        .route("/api/start", post(handlers::start_run))
        .route("/api/stop", post(handlers::stop_run))
        .route("/api/status", get(handlers::run_status))
        .route("/api/limits", get(handlers::list_limits))
        .route("/api/files-info", get(handlers::files_info))
        .route("/api/download/:kind", get(handlers::download))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
