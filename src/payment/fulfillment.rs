//! Post-payment fulfillment hook
//!
//! Fired after an order settles as paid. Failures are logged, never
//! propagated back into the settlement path.

use async_trait::async_trait;

use crate::order::Order;

#[async_trait]
pub trait FulfillmentHook: Send + Sync {
    async fn order_paid(&self, order: &Order) -> anyhow::Result<()>;
}

/// Default hook: logs the paid order and does nothing else.
pub struct NoopFulfillment;

#[async_trait]
impl FulfillmentHook for NoopFulfillment {
    async fn order_paid(&self, order: &Order) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %order.order_id,
            user_id = order.user_id,
            amount = %order.total_amount,
            "Order paid, ready for fulfillment"
        );
        Ok(())
    }
}
