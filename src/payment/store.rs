//! Settlement storage contract
//!
//! Orders and payments settle together: the CAS in `settle_payment_if`
//! flips the payment row and the owning order in one atomic step, which is
//! what makes concurrent verification race-safe.

use async_trait::async_trait;

use super::error::PaymentError;
use super::models::{PaymentRecord, PaymentStatus};
use crate::core_types::{OrderId, PaymentId, UserId};
use crate::order::{Order, OrderStatus};

/// How callers identify a payment: by our order id or by the gateway's.
#[derive(Debug, Clone)]
pub enum PaymentRef {
    Order(OrderId),
    GatewayOrder(String),
}

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<(), PaymentError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, PaymentError>;

    /// Fetch an order only if it belongs to `user_id`.
    async fn get_order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, PaymentError>;

    async fn create_payment(&self, payment: &PaymentRecord) -> Result<(), PaymentError>;

    /// Latest still-unpaid payment attempt for an order, if any.
    async fn find_open_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError>;

    /// The settled-paid payment for an order, if any.
    async fn find_paid_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError>;

    /// Resolve a payment reference to the payment and its owning order,
    /// scoped to `user_id`.
    async fn find_payment_for_user(
        &self,
        user_id: UserId,
        payment_ref: &PaymentRef,
    ) -> Result<Option<(PaymentRecord, Order)>, PaymentError>;

    /// Compare-and-swap settlement. Moves the payment from `expected` to
    /// `new_status` and sets the owning order's payment_status and lifecycle
    /// status in the same step, recording `snapshot` as the gateway evidence.
    ///
    /// Returns false when the payment was no longer in `expected`; the caller
    /// lost the race and must re-read.
    async fn settle_payment_if(
        &self,
        payment_id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
        snapshot: serde_json::Value,
        order_status: OrderStatus,
    ) -> Result<bool, PaymentError>;

    /// Record the latest gateway snapshot without changing any status.
    async fn refresh_snapshot(
        &self,
        payment_id: PaymentId,
        snapshot: serde_json::Value,
    ) -> Result<(), PaymentError>;

    async fn set_order_method(
        &self,
        order_id: OrderId,
        method: &str,
    ) -> Result<(), PaymentError>;

    /// Move an order's lifecycle status (used by shipment tracking, which does
    /// not touch payment state).
    async fn set_order_lifecycle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), PaymentError>;
}
