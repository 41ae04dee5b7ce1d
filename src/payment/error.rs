//! Payment and settlement error types

use thiserror::Error;

use crate::stock::StockError;

#[derive(Error, Debug, Clone)]
pub enum PaymentError {
    // === Validation ===
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Order is not payable: {0}")]
    OrderNotPayable(String),

    #[error("Order already paid")]
    AlreadyPaid,

    // === Reservation window ===
    #[error("Reservation expired - please checkout again")]
    ReservationExpired,

    // === Lookup ===
    #[error("Not found: {0}")]
    NotFound(String),

    // === Stock ===
    #[error(transparent)]
    Stock(#[from] StockError),

    // === Gateway ===
    /// Transient: the gateway could not be reached or answered garbage.
    /// Retryable at initiation, "try again" at verification. State unchanged.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    // === System ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl PaymentError {
    /// Error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "INVALID_PARAMETER",
            PaymentError::OrderNotPayable(_) => "ORDER_NOT_PAYABLE",
            PaymentError::AlreadyPaid => "ALREADY_PAID",
            PaymentError::ReservationExpired => "RESERVATION_EXPIRED",
            PaymentError::NotFound(_) => "NOT_FOUND",
            PaymentError::Stock(e) => e.code(),
            PaymentError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            PaymentError::Database(_) => "DATABASE_ERROR",
            PaymentError::InvariantViolation(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            PaymentError::Validation(_) => 400,
            PaymentError::OrderNotPayable(_) | PaymentError::AlreadyPaid => 409,
            PaymentError::ReservationExpired => 410,
            PaymentError::NotFound(_) => 404,
            PaymentError::Stock(e) => e.http_status(),
            PaymentError::GatewayUnavailable(_) => 502,
            PaymentError::Database(_) | PaymentError::InvariantViolation(_) => 500,
        }
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::GatewayUnavailable(_))
    }
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::VariantKey;

    #[test]
    fn test_codes_and_status() {
        assert_eq!(PaymentError::AlreadyPaid.http_status(), 409);
        assert_eq!(PaymentError::ReservationExpired.code(), "RESERVATION_EXPIRED");
        assert_eq!(PaymentError::NotFound("x".into()).http_status(), 404);
        assert_eq!(
            PaymentError::GatewayUnavailable("timeout".into()).http_status(),
            502
        );
        assert!(PaymentError::GatewayUnavailable("timeout".into()).is_retryable());
        assert!(!PaymentError::AlreadyPaid.is_retryable());
    }

    #[test]
    fn test_stock_error_passthrough() {
        let e = PaymentError::Stock(StockError::InsufficientStock {
            variant: VariantKey::new(1, 1, 1),
            requested: 2,
            available: 0,
        });
        assert_eq!(e.code(), "INSUFFICIENT_STOCK");
        assert_eq!(e.http_status(), 422);
    }
}
