//! API response envelope and error codes
//!
//! Every endpoint answers `{code, msg, data}`: code 0 with data on success,
//! a negative code with a message on failure.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::payment::PaymentError;
use crate::stock::StockError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

pub mod error_codes {
    pub const INVALID_PARAMETER: i32 = -1001;
    pub const INSUFFICIENT_STOCK: i32 = -1002;
    pub const UNKNOWN_VARIANT: i32 = -1003;
    pub const NOT_FOUND: i32 = -2001;
    pub const ORDER_NOT_PAYABLE: i32 = -3001;
    pub const ALREADY_PAID: i32 = -3002;
    pub const RESERVATION_EXPIRED: i32 = -3003;
    pub const GATEWAY_UNAVAILABLE: i32 = -4001;
    pub const UNAUTHORIZED: i32 = -5001;
    pub const INTERNAL_ERROR: i32 = -9001;
}

/// Error half of the envelope, ready to be returned from any handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::UNAUTHORIZED, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_PARAMETER,
            msg,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

fn stock_error_code(e: &StockError) -> i32 {
    match e {
        StockError::InsufficientStock { .. } => error_codes::INSUFFICIENT_STOCK,
        StockError::UnknownVariant(_) => error_codes::UNKNOWN_VARIANT,
        StockError::CheckoutNotFound(_) => error_codes::NOT_FOUND,
        StockError::InvalidQuantity => error_codes::INVALID_PARAMETER,
        StockError::Database(_) => error_codes::INTERNAL_ERROR,
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        let code = match &e {
            PaymentError::Validation(_) => error_codes::INVALID_PARAMETER,
            PaymentError::OrderNotPayable(_) => error_codes::ORDER_NOT_PAYABLE,
            PaymentError::AlreadyPaid => error_codes::ALREADY_PAID,
            PaymentError::ReservationExpired => error_codes::RESERVATION_EXPIRED,
            PaymentError::NotFound(_) => error_codes::NOT_FOUND,
            PaymentError::Stock(stock) => stock_error_code(stock),
            PaymentError::GatewayUnavailable(_) => error_codes::GATEWAY_UNAVAILABLE,
            PaymentError::Database(_) | PaymentError::InvariantViolation(_) => {
                error_codes::INTERNAL_ERROR
            }
        };
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // internal detail stays in the logs, not in the response body
        let msg = match &e {
            PaymentError::Database(detail) | PaymentError::InvariantViolation(detail) => {
                tracing::error!(error = %detail, "Internal error surfaced to API");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, code, msg)
    }
}

impl From<StockError> for ApiError {
    fn from(e: StockError) -> Self {
        ApiError::from(PaymentError::Stock(e))
    }
}
