use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let view = state.dashboard.view();
    Json(json!({
        "status": "ok",
        "fetch": view.state.status.to_string(),
        "timeframe": view.state.timeframe,
        "last_updated": view.state.last_updated,
    }))
}
