mod auth;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing::info;

use common::Result;
use engine::DashboardHandle;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
    /// Bearer token required on `/api/*`; `None` leaves the API open.
    pub token: Option<String>,
}

/// Assemble every route with auth, CORS and gzip applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
        .layer(CompressionLayer::new())
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    info!(%addr, "Dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
