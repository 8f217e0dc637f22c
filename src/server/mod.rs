//! Web control plane for the harvester
//!
//! Exposes the run lifecycle over a small JSON API: replace the filter
//! configuration, start/stop the background crawl, poll its status, check the
//! account's usage limits, and download the result artifacts. The crawl itself
//! executes off the request path as a detached task; the handlers only touch
//! the shared `RunState`.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::state::RunState;

/// Shared state for the control plane
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub run_state: Arc<RunState>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, run_state: Arc<RunState>) -> Self {
        Self { config, run_state }
    }
}

/// Starts the control-plane server
pub async fn serve(config: Arc<AppConfig>, run_state: Arc<RunState>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(config, run_state);
    let app = create_router(state);

    tracing::info!("Control plane listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
