//! Health check handler

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::state::AppState;
use crate::api::types::ApiResponse;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: &'static str,
    pub timestamp_ms: u64,
}

/// GET /api/v1/health
///
/// Pings the database when one is configured. No internal detail leaves the
/// process on failure, just a 503.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    if let Some(db) = &state.db
        && let Err(e) = db.health_check().await
    {
        tracing::error!(error = %e, "Health check: database ping failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: 503,
                msg: "unavailable".to_string(),
                data: None,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(HealthResponse {
            version: env!("GIT_HASH"),
            timestamp_ms,
        })),
    )
}
