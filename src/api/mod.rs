//! HTTP surface
//!
//! Thin axum layer over the orchestrator, reconciliation service, and
//! shipment tracker. Authentication is upstream; handlers trust the
//! `X-User-ID` header the proxy injects.

pub mod handlers;
pub mod state;
pub mod types;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub use state::AppState;
pub use types::{ApiError, ApiResponse};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health::health_check))
        .route("/api/v1/checkout", post(handlers::checkout::create_order))
        .route("/api/v1/payment/initiate", post(handlers::payment::initiate))
        .route(
            "/api/v1/payment/verify",
            post(handlers::payment::verify).get(handlers::payment::verify_query),
        )
        .route("/api/v1/shipment/webhook", post(handlers::shipment::webhook))
        .with_state(state)
}
