mod handlers;
mod params;

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use log::info;

use crate::output::PageRenderer;
use crate::service::DashboardService;

pub use params::resolve_window;

pub struct AppState {
    pub service: DashboardService,
    pub renderer: Box<dyn PageRenderer>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/dashboard", get(handlers::api_dashboard))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("repopulse listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
