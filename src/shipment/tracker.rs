//! Shipment update handling
//!
//! Applies a provider status code to the order record and dispatches the
//! policy action. Refund-bearing actions go through the reconciliation
//! service so the payment row moves under the same CAS discipline as
//! settlement.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::lifecycle::{OrderLifecycle, PolicyAction};
use super::status_map::map_code;
use crate::core_types::OrderId;
use crate::order::OrderStatus;
use crate::payment::{PaymentError, ReconciliationService, SettlementStore};

#[derive(Debug, Clone, Serialize)]
pub struct TrackingOutcome {
    pub order_id: OrderId,
    pub code: i32,
    pub lifecycle: OrderLifecycle,
    pub action: PolicyAction,
    pub order_status: OrderStatus,
    pub refunded: bool,
}

pub struct ShipmentTracker {
    store: Arc<dyn SettlementStore>,
    reconciliation: Arc<ReconciliationService>,
}

impl ShipmentTracker {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        reconciliation: Arc<ReconciliationService>,
    ) -> Self {
        Self {
            store,
            reconciliation,
        }
    }

    /// Apply one provider status update (webhook or poll) to an order.
    pub async fn handle_update(
        &self,
        order_id: OrderId,
        code: i32,
    ) -> Result<TrackingOutcome, PaymentError> {
        if self.store.get_order(order_id).await?.is_none() {
            return Err(PaymentError::NotFound(format!("order {order_id}")));
        }

        let (lifecycle, action) = map_code(code);
        let order_status = OrderStatus::from(lifecycle);

        self.store.set_order_lifecycle(order_id, order_status).await?;
        info!(
            order_id = %order_id,
            code = code,
            lifecycle = %lifecycle,
            action = %action,
            "Shipment status applied"
        );

        let refunded = self.dispatch(order_id, code, lifecycle, action).await?;

        Ok(TrackingOutcome {
            order_id,
            code,
            lifecycle,
            action,
            order_status,
            refunded,
        })
    }

    async fn dispatch(
        &self,
        order_id: OrderId,
        code: i32,
        lifecycle: OrderLifecycle,
        action: PolicyAction,
    ) -> Result<bool, PaymentError> {
        match action {
            PolicyAction::NoAction => Ok(false),
            PolicyAction::CreateReturnRequest => {
                // The return pickup itself is the logistics provider's job;
                // we only note that a return window is now open.
                info!(order_id = %order_id, code = code, "Return request opened");
                Ok(false)
            }
            PolicyAction::CreateRefund | PolicyAction::ImmediateRefund => {
                let reason = format!("shipment code {code} ({lifecycle})");
                self.reconciliation.refund(order_id, &reason, false).await
            }
            PolicyAction::ManualCheckAndRefund => {
                warn!(
                    order_id = %order_id,
                    code = code,
                    lifecycle = %lifecycle,
                    "Shipment needs manual review before funds settle"
                );
                let reason = format!("shipment code {code} ({lifecycle})");
                self.reconciliation.refund(order_id, &reason, true).await
            }
            PolicyAction::ManualCheck => {
                warn!(
                    order_id = %order_id,
                    code = code,
                    lifecycle = %lifecycle,
                    "Shipment flagged for manual review"
                );
                Ok(false)
            }
        }
    }
}
