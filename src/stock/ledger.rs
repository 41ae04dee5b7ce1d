//! Stock ledger contract
//!
//! The ledger is the single shared mutable resource of the engine. Every
//! operation here must be atomic in the backing store: the correctness of the
//! whole engine rests on check-and-decrement / check-and-restore never being
//! split across two round trips. Callers never cache stock counts in memory.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::models::CheckoutHold;
use crate::core_types::{CheckoutId, LineItem, UserId, VariantKey};

#[derive(Error, Debug, Clone)]
pub enum StockError {
    /// Reservation denied; names the first variant that cannot be held so the
    /// client can adjust quantity.
    #[error("Insufficient stock for variant {variant}: requested {requested}, available {available}")]
    InsufficientStock {
        variant: VariantKey,
        requested: i32,
        available: i64,
    },

    #[error("Unknown variant: {0}")]
    UnknownVariant(VariantKey),

    #[error("Checkout not found: {0}")]
    CheckoutNotFound(CheckoutId),

    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Database error: {0}")]
    Database(String),
}

impl StockError {
    pub fn code(&self) -> &'static str {
        match self {
            StockError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            StockError::UnknownVariant(_) => "UNKNOWN_VARIANT",
            StockError::CheckoutNotFound(_) => "CHECKOUT_NOT_FOUND",
            StockError::InvalidQuantity => "INVALID_QUANTITY",
            StockError::Database(_) => "DATABASE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            StockError::InsufficientStock { .. } => 422,
            StockError::UnknownVariant(_) => 400,
            StockError::CheckoutNotFound(_) => 404,
            StockError::InvalidQuantity => 400,
            StockError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for StockError {
    fn from(e: sqlx::Error) -> Self {
        StockError::Database(e.to_string())
    }
}

/// Atomic reserve/release/consume primitives over per-variant stock
///
/// # Idempotency
/// `release` and `consume` are no-ops (not errors) when every reservation of
/// the checkout is already terminal. `sweep_expired` transitions each row at
/// most once and is safe to run concurrently with itself.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Atomically create a PROCESSING checkout plus one ACTIVE reservation per
    /// line item, decrementing the sellable count for each variant. Fails the
    /// whole batch if any item is insufficiently stocked.
    async fn reserve(
        &self,
        user_id: UserId,
        items: &[LineItem],
        ttl: Duration,
    ) -> Result<CheckoutHold, StockError>;

    /// Restore quantity for the checkout's still-ACTIVE reservations and mark
    /// them RELEASED. Returns the number of reservations released.
    async fn release(&self, checkout_id: CheckoutId) -> Result<u64, StockError>;

    /// Flip the checkout's ACTIVE reservations to CONSUMED and record the
    /// permanent decrement. Returns the number of reservations consumed.
    async fn consume(&self, checkout_id: CheckoutId) -> Result<u64, StockError>;

    /// Expire every ACTIVE reservation whose `reserved_until` has passed and
    /// restore its quantity. Returns the number of reservations expired.
    async fn sweep_expired(&self) -> Result<u64, StockError>;

    /// Latest PROCESSING checkout for the user by creation time, if any.
    async fn find_processing_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Option<CheckoutHold>, StockError>;

    /// Load a checkout with its reservations by id.
    async fn get_checkout(&self, checkout_id: CheckoutId)
    -> Result<Option<CheckoutHold>, StockError>;

    /// Current sellable count for a variant.
    async fn available(&self, variant: &VariantKey) -> Result<i64, StockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let e = StockError::InsufficientStock {
            variant: VariantKey::new(1, 2, 3),
            requested: 4,
            available: 2,
        };
        assert_eq!(e.code(), "INSUFFICIENT_STOCK");
        assert_eq!(e.http_status(), 422);
        assert!(e.to_string().contains("1/2/3"));

        assert_eq!(StockError::InvalidQuantity.http_status(), 400);
        assert_eq!(StockError::Database("x".into()).http_status(), 500);
    }
}
