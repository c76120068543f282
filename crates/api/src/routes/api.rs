use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use common::{BandFilter, Direction, Error, SortField, Timeframe};

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/view", get(get_view))
        .route("/api/direction", post(post_direction))
        .route("/api/timeframe", post(post_timeframe))
        .route("/api/limit", post(post_limit))
        .route("/api/band", post(post_band))
        .route("/api/sort", post(post_sort))
        .route("/api/refresh", post(post_refresh))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ─── View ─────────────────────────────────────────────────────────────────────

async fn get_view(State(state): State<AppState>) -> Response {
    let view = state.dashboard.view();
    Json(&*view).into_response()
}

// ─── Commands ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DirectionBody {
    direction: String,
}

#[derive(Deserialize)]
struct TimeframeBody {
    timeframe: String,
}

#[derive(Deserialize)]
struct LimitBody {
    limit: i64,
}

#[derive(Deserialize)]
struct BandBody {
    band: String,
}

#[derive(Deserialize)]
struct SortBody {
    field: String,
}

async fn post_direction(
    State(state): State<AppState>,
    body: Result<Json<DirectionBody>, JsonRejection>,
) -> Response {
    match body.map_err(rejected).and_then(|Json(b)| parse::<Direction>(&b.direction)) {
        Ok(direction) => {
            state.dashboard.set_direction(direction).await;
            accepted()
        }
        Err(resp) => resp,
    }
}

async fn post_timeframe(
    State(state): State<AppState>,
    body: Result<Json<TimeframeBody>, JsonRejection>,
) -> Response {
    match body.map_err(rejected).and_then(|Json(b)| parse::<Timeframe>(&b.timeframe)) {
        Ok(timeframe) => {
            state.dashboard.set_timeframe(timeframe).await;
            accepted()
        }
        Err(resp) => resp,
    }
}

async fn post_limit(
    State(state): State<AppState>,
    body: Result<Json<LimitBody>, JsonRejection>,
) -> Response {
    let limit = match body {
        Ok(Json(b)) => b.limit,
        Err(e) => return rejected(e),
    };
    let Ok(limit) = u32::try_from(limit) else {
        return bad_request(&Error::InvalidParameter(format!(
            "limit must be a positive integer, got {limit}"
        )));
    };
    match state.dashboard.set_limit(limit).await {
        Ok(()) => accepted(),
        Err(e) => bad_request(&e),
    }
}

async fn post_band(
    State(state): State<AppState>,
    body: Result<Json<BandBody>, JsonRejection>,
) -> Response {
    match body.map_err(rejected).and_then(|Json(b)| parse::<BandFilter>(&b.band)) {
        Ok(filter) => {
            state.dashboard.set_band_filter(filter).await;
            accepted()
        }
        Err(resp) => resp,
    }
}

async fn post_sort(
    State(state): State<AppState>,
    body: Result<Json<SortBody>, JsonRejection>,
) -> Response {
    match body.map_err(rejected).and_then(|Json(b)| parse::<SortField>(&b.field)) {
        Ok(field) => {
            state.dashboard.set_sort(field).await;
            accepted()
        }
        Err(resp) => resp,
    }
}

async fn post_refresh(State(state): State<AppState>) -> Response {
    info!("Manual refresh requested");
    state.dashboard.refresh_now().await;
    accepted()
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn parse<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = Error>,
{
    raw.parse().map_err(|e: Error| bad_request(&e))
}

fn accepted() -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response()
}

fn bad_request(e: &Error) -> Response {
    warn!(error = %e, "Rejected dashboard command");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response()
}

fn rejected(e: JsonRejection) -> Response {
    warn!(error = %e, "Malformed request body");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.body_text() }))).into_response()
}
