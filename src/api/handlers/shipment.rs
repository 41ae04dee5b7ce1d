//! Shipment webhook endpoint

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::core_types::OrderId;
use crate::shipment::TrackingOutcome;

#[derive(Debug, Deserialize)]
pub struct ShipmentWebhook {
    pub order_id: OrderId,
    pub status_code: i32,
}

/// POST /api/v1/shipment/webhook
///
/// Provider-facing: no user scoping, the payload carries our order id.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ShipmentWebhook>,
) -> Result<Json<ApiResponse<TrackingOutcome>>, ApiError> {
    let outcome = state
        .tracker
        .handle_update(update.order_id, update.status_code)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
