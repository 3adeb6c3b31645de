use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use log::{error, info};

use super::params::{redirect_target, DashboardQuery};
use super::AppState;

pub async fn index(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Response {
    let query = DashboardQuery::parse(raw.as_deref());
    let default_window = state.service.default_window_days();
    if query.window.is_none() {
        let target = redirect_target(default_window, query.network.as_deref());
        return Redirect::to(&target).into_response();
    }

    let request = query.to_request(default_window);
    info!(
        "GET / window={} trend_mode={} network={}",
        request.window_days, request.mode, request.include_network
    );

    let payload = state.service.load(&request).await;
    match state.renderer.render(&payload) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("Failed to render dashboard page: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
        }
    }
}

pub async fn api_dashboard(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    let request =
        DashboardQuery::parse(raw.as_deref()).to_request(state.service.default_window_days());
    info!(
        "GET /api/dashboard window={} trend_mode={} network={}",
        request.window_days, request.mode, request.include_network
    );

    let payload = state.service.load(&request).await;
    Json(payload.as_ref().clone())
}

pub async fn healthz() -> &'static str {
    "ok"
}
