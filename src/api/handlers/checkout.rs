//! Checkout endpoint

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use std::sync::Arc;

use super::extract_user_id;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::checkout::{CreateOrderOutcome, CreateOrderRequest};

/// POST /api/v1/checkout
///
/// Reserves stock and creates the order. Prepaid methods get a payment
/// session in the response; COD orders come back already confirmed.
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<CreateOrderOutcome>>, ApiError> {
    let user_id = extract_user_id(&headers)?;
    let outcome = state.orchestrator.create_order(user_id, &req).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
