//! Payment initiation and verification endpoints

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::Deserialize;
use std::sync::Arc;

use super::extract_user_id;
use crate::api::state::AppState;
use crate::api::types::{ApiError, ApiResponse};
use crate::core_types::OrderId;
use crate::payment::{InitiateOutcome, PaymentRef, VerifyOutcome};

#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub order_id: OrderId,
    pub method: Option<String>,
}

/// POST /api/v1/payment/initiate
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InitiateRequest>,
) -> Result<Json<ApiResponse<InitiateOutcome>>, ApiError> {
    let user_id = extract_user_id(&headers)?;
    let outcome = state
        .reconciliation
        .initiate(user_id, req.order_id, req.method.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Either our order id or the gateway's; exactly one is required.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub order_id: Option<OrderId>,
    pub gateway_order_id: Option<String>,
}

impl VerifyParams {
    fn payment_ref(self) -> Result<PaymentRef, ApiError> {
        match (self.order_id, self.gateway_order_id) {
            (Some(order_id), None) => Ok(PaymentRef::Order(order_id)),
            (None, Some(gw_id)) => Ok(PaymentRef::GatewayOrder(gw_id)),
            _ => Err(ApiError::bad_request(
                "provide exactly one of order_id, gateway_order_id",
            )),
        }
    }
}

/// POST /api/v1/payment/verify
///
/// Reconciles the payment against the gateway. Safe to call any number of
/// times; repeated calls after settlement are read-only.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(params): Json<VerifyParams>,
) -> Result<Json<ApiResponse<VerifyOutcome>>, ApiError> {
    let user_id = extract_user_id(&headers)?;
    let payment_ref = params.payment_ref()?;
    let outcome = state.reconciliation.verify(user_id, &payment_ref).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// GET /api/v1/payment/verify?order_id=, same shape as the POST. Used by
/// clients polling after returning from the hosted page.
pub async fn verify_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<VerifyParams>,
) -> Result<Json<ApiResponse<VerifyOutcome>>, ApiError> {
    let user_id = extract_user_id(&headers)?;
    let payment_ref = params.payment_ref()?;
    let outcome = state.reconciliation.verify(user_id, &payment_ref).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
