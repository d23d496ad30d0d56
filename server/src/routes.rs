//! Route definitions for the FlightSurety relay API

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::handlers::*;

/// Read-only relay routes plus the push channel.
pub fn relay_routes() -> Router<AppState> {
    Router::new()
        .route("/api", get(api_root))
        .route("/status", get(get_status))
        .route("/refunds", get(get_refunds))
        .route("/withdraws", get(get_withdraws))
        .route("/ws", get(ledger_socket))
}

/// The full application with CORS open to every origin.
pub fn app(state: AppState) -> Router {
    relay_routes()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
