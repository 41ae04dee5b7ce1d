use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::core_types::{LineItem, OrderId, UserId, VariantKey};
use crate::order::{Order, OrderStatus};
use crate::payment::{
    InitiateOutcome, PaymentError, PaymentRef, ReconciliationService, SettlementStore,
    VerifyOutcome,
};
use crate::stock::ReservationManager;

pub const METHOD_COD: &str = "cod";

/// One purchase line as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: i64,
    pub color_id: i32,
    pub size_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl CheckoutLine {
    fn variant(&self) -> VariantKey {
        VariantKey::new(self.product_id, self.color_id, self.size_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CheckoutLine>,
    /// "cod" finalizes immediately; anything else is forwarded to the gateway
    /// as a method filter.
    pub payment_method: String,
    pub shipping_address_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderOutcome {
    pub order_id: OrderId,
    pub total_amount: Decimal,
    pub payment_required: bool,
    /// None for COD, and for prepaid orders whose session could not be opened
    /// yet (the order stays pending and initiation can be retried).
    pub session: Option<InitiateOutcome>,
}

pub struct CheckoutOrchestrator {
    reservations: Arc<ReservationManager>,
    store: Arc<dyn SettlementStore>,
    reconciliation: Arc<ReconciliationService>,
}

impl CheckoutOrchestrator {
    pub fn new(
        reservations: Arc<ReservationManager>,
        store: Arc<dyn SettlementStore>,
        reconciliation: Arc<ReconciliationService>,
    ) -> Self {
        Self {
            reservations,
            store,
            reconciliation,
        }
    }

    fn validate(req: &CreateOrderRequest) -> Result<(), PaymentError> {
        if req.items.is_empty() {
            return Err(PaymentError::Validation("no items in checkout".to_string()));
        }
        for line in &req.items {
            if line.quantity <= 0 {
                return Err(PaymentError::Validation(format!(
                    "invalid quantity {} for {}",
                    line.quantity,
                    line.variant()
                )));
            }
            if line.unit_price < Decimal::ZERO {
                return Err(PaymentError::Validation(format!(
                    "negative price for {}",
                    line.variant()
                )));
            }
        }
        if req.payment_method.trim().is_empty() {
            return Err(PaymentError::Validation("missing payment method".to_string()));
        }
        Ok(())
    }

    /// Reserve stock, persist the order, and open a payment session when the
    /// method needs one. COD orders consume their hold immediately.
    pub async fn create_order(
        &self,
        user_id: UserId,
        req: &CreateOrderRequest,
    ) -> Result<CreateOrderOutcome, PaymentError> {
        Self::validate(req)?;

        let items: Vec<LineItem> = req
            .items
            .iter()
            .map(|l| LineItem::new(l.variant(), l.quantity))
            .collect();
        let total: Decimal = req
            .items
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();

        let hold = self.reservations.reserve_for_checkout(user_id, &items).await?;
        let checkout_id = hold.checkout.checkout_id;

        let order = Order::new(user_id, checkout_id, total, req.shipping_address_id);
        if let Err(e) = self.store.create_order(&order).await {
            // the hold must not outlive a failed order insert
            if let Err(release_err) = self.reservations.release_checkout(checkout_id).await {
                error!(
                    checkout_id = %checkout_id,
                    error = %release_err,
                    "Failed to release hold after order insert failure"
                );
            }
            return Err(e);
        }

        info!(
            order_id = %order.order_id,
            user_id = user_id,
            checkout_id = %checkout_id,
            total = %total,
            method = %req.payment_method,
            "Order created"
        );

        if req.payment_method.eq_ignore_ascii_case(METHOD_COD) {
            self.finalize_cod(&order, &req.payment_method).await?;
            return Ok(CreateOrderOutcome {
                order_id: order.order_id,
                total_amount: total,
                payment_required: false,
                session: None,
            });
        }

        let session = match self
            .reconciliation
            .initiate(user_id, order.order_id, Some(&req.payment_method))
            .await
        {
            Ok(session) => Some(session),
            // Order stands, session can be re-opened via the initiate endpoint.
            Err(PaymentError::GatewayUnavailable(e)) => {
                error!(order_id = %order.order_id, error = %e, "Session creation deferred");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(CreateOrderOutcome {
            order_id: order.order_id,
            total_amount: total,
            payment_required: true,
            session,
        })
    }

    /// COD: stock is committed at order time, payment stays UNPAID until the
    /// courier collects.
    async fn finalize_cod(&self, order: &Order, method: &str) -> Result<(), PaymentError> {
        let consumed = self.reservations.consume_checkout(order.checkout_id).await?;
        if consumed == 0 {
            return Err(PaymentError::InvariantViolation(format!(
                "checkout {} had no reservations to consume",
                order.checkout_id
            )));
        }
        self.store.set_order_method(order.order_id, method).await?;
        self.store
            .set_order_lifecycle(order.order_id, OrderStatus::Confirmed)
            .await?;
        info!(order_id = %order.order_id, "COD order confirmed");
        Ok(())
    }

    /// The user came back from the hosted payment page (or a webhook fired).
    pub async fn handle_gateway_return(
        &self,
        user_id: UserId,
        payment_ref: &PaymentRef,
    ) -> Result<VerifyOutcome, PaymentError> {
        self.reconciliation.verify(user_id, payment_ref).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::fulfillment::NoopFulfillment;
    use crate::payment::gateway::MockPaymentGateway;
    use crate::payment::memory::MemorySettlementStore;
    use crate::payment::{PaymentStatus, RetryPolicy};
    use crate::stock::{MemoryStockLedger, StockError, StockLedger};
    use std::time::Duration;

    const USER: UserId = 11;

    struct Harness {
        orchestrator: CheckoutOrchestrator,
        store: Arc<MemorySettlementStore>,
        gateway: Arc<MockPaymentGateway>,
        ledger: Arc<MemoryStockLedger>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemoryStockLedger::new());
        let manager = Arc::new(ReservationManager::new(
            ledger.clone(),
            Duration::from_secs(900),
        ));
        let store = Arc::new(MemorySettlementStore::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let reconciliation = Arc::new(ReconciliationService::new(
            store.clone(),
            gateway.clone(),
            manager.clone(),
            Arc::new(NoopFulfillment),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1)),
            "INR".to_string(),
            "https://shop.example.com/return".to_string(),
        ));
        let orchestrator =
            CheckoutOrchestrator::new(manager, store.clone(), reconciliation);
        Harness {
            orchestrator,
            store,
            gateway,
            ledger,
        }
    }

    fn line(qty: i32) -> CheckoutLine {
        CheckoutLine {
            product_id: 5,
            color_id: 2,
            size_id: 3,
            quantity: qty,
            unit_price: Decimal::new(129900, 2),
        }
    }

    fn request(method: &str, qty: i32) -> CreateOrderRequest {
        CreateOrderRequest {
            items: vec![line(qty)],
            payment_method: method.to_string(),
            shipping_address_id: Some(77),
        }
    }

    fn variant() -> VariantKey {
        VariantKey::new(5, 2, 3)
    }

    #[tokio::test]
    async fn test_prepaid_order_opens_session() {
        let h = harness();
        h.ledger.seed_stock(variant(), 10);

        let outcome = h
            .orchestrator
            .create_order(USER, &request("upi", 2))
            .await
            .unwrap();
        assert!(outcome.payment_required);
        assert!(outcome.session.is_some());
        assert_eq!(outcome.total_amount, Decimal::new(259800, 2));

        // hold taken, nothing sold yet
        assert_eq!(h.ledger.available(&variant()).await.unwrap(), 8);
        assert_eq!(h.ledger.sold(&variant()), 0);

        let order = h.store.get_order(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_method.as_deref(), Some("upi"));
    }

    #[tokio::test]
    async fn test_cod_order_finalizes_immediately() {
        let h = harness();
        h.ledger.seed_stock(variant(), 10);

        let outcome = h
            .orchestrator
            .create_order(USER, &request("COD", 1))
            .await
            .unwrap();
        assert!(!outcome.payment_required);
        assert!(outcome.session.is_none());

        // stock committed at order time
        assert_eq!(h.ledger.sold(&variant()), 1);

        let order = h.store.get_order(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        // money has not moved
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(h.gateway.create_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_creates_nothing() {
        let h = harness();
        h.ledger.seed_stock(variant(), 1);

        let err = h
            .orchestrator
            .create_order(USER, &request("upi", 3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Stock(StockError::InsufficientStock { .. })
        ));
        assert_eq!(h.ledger.available(&variant()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_ledger() {
        let h = harness();
        h.ledger.seed_stock(variant(), 5);

        let empty = CreateOrderRequest {
            items: vec![],
            payment_method: "upi".to_string(),
            shipping_address_id: None,
        };
        assert!(matches!(
            h.orchestrator.create_order(USER, &empty).await.unwrap_err(),
            PaymentError::Validation(_)
        ));
        assert!(matches!(
            h.orchestrator
                .create_order(USER, &request("upi", 0))
                .await
                .unwrap_err(),
            PaymentError::Validation(_)
        ));
        // the ledger was never touched
        assert_eq!(h.ledger.available(&variant()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_gateway_outage_defers_session() {
        let h = harness();
        h.ledger.seed_stock(variant(), 5);
        h.gateway.set_fail_create(true);

        let outcome = h
            .orchestrator
            .create_order(USER, &request("card", 1))
            .await
            .unwrap();
        assert!(outcome.payment_required);
        assert!(outcome.session.is_none());

        // hold and order both stand, so initiation can be retried
        assert_eq!(h.ledger.available(&variant()).await.unwrap(), 4);
        let order = h.store.get_order(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_full_prepaid_flow_through_verify() {
        let h = harness();
        h.ledger.seed_stock(variant(), 5);

        let outcome = h
            .orchestrator
            .create_order(USER, &request("upi", 1))
            .await
            .unwrap();
        let session = outcome.session.unwrap();
        h.gateway.set_order_status(&session.gateway_order_id, "PAID");

        let verified = h
            .orchestrator
            .handle_gateway_return(USER, &PaymentRef::GatewayOrder(session.gateway_order_id))
            .await
            .unwrap();
        assert_eq!(verified.payment_status, PaymentStatus::Paid);
        assert_eq!(verified.order_status, OrderStatus::Confirmed);
        assert_eq!(h.ledger.sold(&variant()), 1);
    }
}
