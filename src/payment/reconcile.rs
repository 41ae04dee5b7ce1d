//! Payment reconciliation
//!
//! The gateway is the source of truth for whether money moved; our rows are
//! the source of truth for stock. `verify` pulls the gateway's verdict and
//! applies it exactly once through the settlement CAS:
//!
//! - PAID settles the payment, confirms the order, and consumes the hold.
//! - FAILED / DROPPED settles the payment and releases the hold.
//! - still UNPAID records the snapshot and changes nothing.
//!
//! Concurrent verifiers are safe: only the CAS winner touches stock, losers
//! re-read and report the settled state.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::PaymentError;
use super::fulfillment::FulfillmentHook;
use super::gateway::{GatewayError, PaymentGateway, SessionRequest, normalize_status};
use super::models::{PaymentRecord, PaymentStatus};
use super::retry::RetryPolicy;
use super::store::{PaymentRef, SettlementStore};
use crate::core_types::{OrderId, PaymentId, UserId};
use crate::order::{Order, OrderStatus};
use crate::stock::ReservationManager;

/// Result of a verification pass
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub amount: Decimal,
}

/// Result of payment initiation
#[derive(Debug, Clone, Serialize)]
pub struct InitiateOutcome {
    pub payment_id: PaymentId,
    pub session_id: String,
    pub gateway_order_id: String,
}

pub struct ReconciliationService {
    store: Arc<dyn SettlementStore>,
    gateway: Arc<dyn PaymentGateway>,
    reservations: Arc<ReservationManager>,
    fulfillment: Arc<dyn FulfillmentHook>,
    retry: RetryPolicy,
    currency: String,
    return_url: String,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn SettlementStore>,
        gateway: Arc<dyn PaymentGateway>,
        reservations: Arc<ReservationManager>,
        fulfillment: Arc<dyn FulfillmentHook>,
        retry: RetryPolicy,
        currency: String,
        return_url: String,
    ) -> Self {
        Self {
            store,
            gateway,
            reservations,
            fulfillment,
            retry,
            currency,
            return_url,
        }
    }

    fn outcome(payment: &PaymentRecord, order: &Order) -> VerifyOutcome {
        VerifyOutcome {
            order_id: order.order_id,
            payment_status: payment.status,
            order_status: order.status,
            amount: payment.amount,
        }
    }

    /// Reconcile a payment against the gateway's authoritative status.
    pub async fn verify(
        &self,
        user_id: UserId,
        payment_ref: &PaymentRef,
    ) -> Result<VerifyOutcome, PaymentError> {
        let (payment, order) = self
            .store
            .find_payment_for_user(user_id, payment_ref)
            .await?
            .ok_or_else(|| PaymentError::NotFound("payment".to_string()))?;

        // Fast path: already settled. For paid orders re-run the consume as an
        // idempotent catch-up in case an earlier verifier settled the rows but
        // crashed before touching stock.
        if payment.status == PaymentStatus::Paid {
            self.reservations.consume_checkout(order.checkout_id).await?;
            return Ok(Self::outcome(&payment, &order));
        }
        if payment.status.is_settled() {
            return Ok(Self::outcome(&payment, &order));
        }

        let gateway_order = self
            .gateway
            .fetch_order(&payment.gateway_order_id)
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        match normalize_status(&gateway_order.status) {
            PaymentStatus::Paid => {
                self.settle_paid(&payment, &order, gateway_order.raw).await
            }
            verdict @ (PaymentStatus::Failed | PaymentStatus::Dropped) => {
                self.settle_failed(&payment, &order, verdict, gateway_order.raw)
                    .await
            }
            _ => {
                // Still pending at the gateway. Record the snapshot only.
                self.store
                    .refresh_snapshot(payment.payment_id, gateway_order.raw)
                    .await?;
                Ok(Self::outcome(&payment, &order))
            }
        }
    }

    async fn settle_paid(
        &self,
        payment: &PaymentRecord,
        order: &Order,
        snapshot: serde_json::Value,
    ) -> Result<VerifyOutcome, PaymentError> {
        let won = self
            .store
            .settle_payment_if(
                payment.payment_id,
                PaymentStatus::Unpaid,
                PaymentStatus::Paid,
                snapshot,
                OrderStatus::Confirmed,
            )
            .await?;

        if !won {
            return self.reread(payment.payment_id, order).await;
        }

        let consumed = self.reservations.consume_checkout(order.checkout_id).await?;
        if consumed == 0 {
            // Payment arrived after the hold expired and the stock went back
            // on sale. Needs manual stock review.
            warn!(
                order_id = %order.order_id,
                checkout_id = %order.checkout_id,
                "Paid order had no active reservations to consume"
            );
        }

        info!(
            order_id = %order.order_id,
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Payment verified as PAID"
        );

        let fulfillment = Arc::clone(&self.fulfillment);
        let mut paid_order = order.clone();
        paid_order.status = OrderStatus::Confirmed;
        paid_order.payment_status = PaymentStatus::Paid;
        let hook_order = paid_order.clone();
        tokio::spawn(async move {
            if let Err(e) = fulfillment.order_paid(&hook_order).await {
                error!(order_id = %hook_order.order_id, error = %e, "Fulfillment hook failed");
            }
        });

        let mut settled = payment.clone();
        settled.status = PaymentStatus::Paid;
        Ok(Self::outcome(&settled, &paid_order))
    }

    async fn settle_failed(
        &self,
        payment: &PaymentRecord,
        order: &Order,
        verdict: PaymentStatus,
        snapshot: serde_json::Value,
    ) -> Result<VerifyOutcome, PaymentError> {
        let won = self
            .store
            .settle_payment_if(
                payment.payment_id,
                PaymentStatus::Unpaid,
                verdict,
                snapshot,
                OrderStatus::Cancelled,
            )
            .await?;

        if !won {
            return self.reread(payment.payment_id, order).await;
        }

        let released = self.reservations.release_checkout(order.checkout_id).await?;
        info!(
            order_id = %order.order_id,
            payment_id = %payment.payment_id,
            verdict = %verdict,
            released = released,
            "Payment settled as not-paid, hold released"
        );

        let mut settled = payment.clone();
        settled.status = verdict;
        let mut failed_order = order.clone();
        failed_order.status = OrderStatus::Cancelled;
        failed_order.payment_status = verdict;
        Ok(Self::outcome(&settled, &failed_order))
    }

    /// CAS loser path: another verifier settled first. Report their result.
    async fn reread(
        &self,
        payment_id: PaymentId,
        order: &Order,
    ) -> Result<VerifyOutcome, PaymentError> {
        let (payment, order) = self
            .store
            .find_payment_for_user(order.user_id, &PaymentRef::Order(order.order_id))
            .await?
            .ok_or_else(|| {
                PaymentError::InvariantViolation(format!(
                    "payment {payment_id} vanished during settlement"
                ))
            })?;
        Ok(Self::outcome(&payment, &order))
    }

    /// Open (or re-use) a payment session for a pending order.
    pub async fn initiate(
        &self,
        user_id: UserId,
        order_id: OrderId,
        method: Option<&str>,
    ) -> Result<InitiateOutcome, PaymentError> {
        let order = self
            .store
            .get_order_for_user(user_id, order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("order {order_id}")))?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.status != OrderStatus::Pending {
            return Err(PaymentError::OrderNotPayable(format!(
                "order is {}",
                order.status
            )));
        }

        // The payment window is the reservation window. An expired hold means
        // the stock is no longer promised to this order.
        let live = match self.reservations.get_checkout(order.checkout_id).await? {
            Some(hold) => hold.checkout.is_live(chrono::Utc::now()),
            None => false,
        };
        if !live {
            self.reservations.cleanup_expired().await?;
            return Err(PaymentError::ReservationExpired);
        }

        // Idempotent initiation: an open attempt re-uses its session instead
        // of opening a second one at the gateway.
        if let Some(open) = self.store.find_open_payment(order_id).await? {
            info!(
                order_id = %order_id,
                payment_id = %open.payment_id,
                "Re-using open payment session"
            );
            return Ok(InitiateOutcome {
                payment_id: open.payment_id,
                session_id: open.session_id,
                gateway_order_id: open.gateway_order_id,
            });
        }

        let request = SessionRequest {
            order_id,
            user_id,
            amount: order.total_amount,
            currency: self.currency.clone(),
            return_url: self.return_url.clone(),
            method_filter: method.map(str::to_string),
        };
        let session = self
            .retry
            .run("gateway_create_session", || {
                self.gateway.create_session(&request)
            })
            .await
            .map_err(|e: GatewayError| PaymentError::GatewayUnavailable(e.to_string()))?;

        let payment = PaymentRecord::new(
            order_id,
            session.gateway_order_id.clone(),
            session.session_id.clone(),
            order.total_amount,
        );
        self.store.create_payment(&payment).await?;

        if let Some(method) = method {
            self.store.set_order_method(order_id, method).await?;
        }

        info!(
            order_id = %order_id,
            payment_id = %payment.payment_id,
            gateway = self.gateway.name(),
            "Payment session created"
        );

        Ok(InitiateOutcome {
            payment_id: payment.payment_id,
            session_id: session.session_id,
            gateway_order_id: session.gateway_order_id,
        })
    }

    /// Move a paid payment to REFUNDED. Ok(false) when there is nothing to
    /// refund (COD or never-paid orders). The order's lifecycle status stays
    /// where shipment tracking put it.
    pub async fn refund(
        &self,
        order_id: OrderId,
        reason: &str,
        manual: bool,
    ) -> Result<bool, PaymentError> {
        let Some(payment) = self.store.find_paid_payment(order_id).await? else {
            info!(order_id = %order_id, reason = reason, "No paid payment to refund");
            return Ok(false);
        };
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("order {order_id}")))?;

        let snapshot = json!({
            "refund_reason": reason,
            "manual_review": manual,
            "previous_response": payment.gateway_response,
        });
        let won = self
            .store
            .settle_payment_if(
                payment.payment_id,
                PaymentStatus::Paid,
                PaymentStatus::Refunded,
                snapshot,
                order.status,
            )
            .await?;

        if won {
            info!(
                order_id = %order_id,
                payment_id = %payment.payment_id,
                amount = %payment.amount,
                reason = reason,
                manual = manual,
                "Refund recorded"
            );
        }
        Ok(won)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{LineItem, VariantKey};
    use crate::payment::fulfillment::testing::RecordingFulfillment;
    use crate::payment::gateway::MockPaymentGateway;
    use crate::payment::memory::MemorySettlementStore;
    use crate::stock::{MemoryStockLedger, StockLedger};
    use std::time::Duration;

    struct Harness {
        service: ReconciliationService,
        store: Arc<MemorySettlementStore>,
        gateway: Arc<MockPaymentGateway>,
        ledger: Arc<MemoryStockLedger>,
        manager: Arc<ReservationManager>,
        fulfillment: Arc<RecordingFulfillment>,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(MemoryStockLedger::new());
        let manager = Arc::new(ReservationManager::new(
            ledger.clone(),
            Duration::from_secs(900),
        ));
        let store = Arc::new(MemorySettlementStore::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let fulfillment = Arc::new(RecordingFulfillment::default());
        let service = ReconciliationService::new(
            store.clone(),
            gateway.clone(),
            manager.clone(),
            fulfillment.clone(),
            RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(1)),
            "INR".to_string(),
            "https://shop.example.com/return".to_string(),
        );
        Harness {
            service,
            store,
            gateway,
            ledger,
            manager,
            fulfillment,
        }
    }

    const USER: UserId = 42;

    fn variant() -> VariantKey {
        VariantKey::new(1, 1, 1)
    }

    /// Reserve stock, create a pending order, initiate payment. Returns the
    /// order and the gateway's order id.
    async fn pending_order(h: &Harness) -> (Order, String) {
        h.ledger.seed_stock(variant(), 10);
        let hold = h
            .manager
            .reserve_for_checkout(USER, &[LineItem::new(variant(), 2)])
            .await
            .unwrap();
        let order = Order::new(
            USER,
            hold.checkout.checkout_id,
            Decimal::new(259800, 2),
            None,
        );
        h.store.create_order(&order).await.unwrap();
        let initiated = h.service.initiate(USER, order.order_id, Some("upi")).await.unwrap();
        (order, initiated.gateway_order_id)
    }

    #[tokio::test]
    async fn test_verify_paid_confirms_and_consumes() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "PAID");

        let outcome = h
            .service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();
        assert_eq!(outcome.payment_status, PaymentStatus::Paid);
        assert_eq!(outcome.order_status, OrderStatus::Confirmed);

        assert_eq!(h.ledger.sold(&variant()), 2);
        assert_eq!(h.ledger.consume_effects(), 1);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.fulfillment.seen.lock().unwrap().as_slice(), [order.order_id]);
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let h = harness();
        let (_order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "PAID");

        for _ in 0..3 {
            let outcome = h
                .service
                .verify(USER, &PaymentRef::GatewayOrder(gw_id.clone()))
                .await
                .unwrap();
            assert_eq!(outcome.payment_status, PaymentStatus::Paid);
        }
        // Stock consumed exactly once
        assert_eq!(h.ledger.sold(&variant()), 2);
        assert_eq!(h.ledger.consume_effects(), 1);
    }

    #[tokio::test]
    async fn test_verify_failed_releases_hold() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "FAILED");

        let outcome = h
            .service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();
        assert_eq!(outcome.payment_status, PaymentStatus::Failed);
        assert_eq!(outcome.order_status, OrderStatus::Cancelled);

        // Stock back on sale, nothing sold
        assert_eq!(h.ledger.sold(&variant()), 0);
        assert_eq!(h.ledger.release_effects(), 1);
        let v = variant();
        assert_eq!(h.ledger.available(&v).await.unwrap(), 10);
        assert!(h.fulfillment.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verify_dropped_maps_to_dropped() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "USER_DROPPED");

        let outcome = h
            .service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();
        assert_eq!(outcome.payment_status, PaymentStatus::Dropped);
        assert_eq!(h.ledger.release_effects(), 1);
    }

    #[tokio::test]
    async fn test_verify_pending_changes_nothing() {
        let h = harness();
        let (order, _gw_id) = pending_order(&h).await;
        // mock reports ACTIVE by default

        let outcome = h
            .service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();
        assert_eq!(outcome.payment_status, PaymentStatus::Unpaid);
        assert_eq!(outcome.order_status, OrderStatus::Pending);
        assert_eq!(h.ledger.consume_effects(), 0);
        assert_eq!(h.ledger.release_effects(), 0);
    }

    #[tokio::test]
    async fn test_gateway_outage_leaves_state_unchanged() {
        let h = harness();
        let (order, _gw_id) = pending_order(&h).await;
        h.gateway.set_fail_fetch(true);

        let err = h
            .service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::GatewayUnavailable(_)));

        let stored = h.store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Unpaid);
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(h.ledger.consume_effects(), 0);
    }

    #[tokio::test]
    async fn test_initiate_reuses_open_session() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;

        let again = h.service.initiate(USER, order.order_id, None).await.unwrap();
        assert_eq!(again.gateway_order_id, gw_id);
        // Only the first call reached the gateway
        assert_eq!(h.gateway.create_count(), 1);
    }

    #[tokio::test]
    async fn test_initiate_rejects_paid_order() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "PAID");
        h.service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();

        let err = h.service.initiate(USER, order.order_id, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::AlreadyPaid));
    }

    #[tokio::test]
    async fn test_initiate_after_expiry_is_gone() {
        let h = harness();
        let (order, _gw_id) = pending_order(&h).await;

        h.ledger.advance(Duration::from_secs(1000));
        let err = h.service.initiate(USER, order.order_id, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::ReservationExpired));

        // The failed initiation swept the stale hold back into stock
        let v = variant();
        assert_eq!(h.ledger.available(&v).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_initiate_wrong_user_not_found() {
        let h = harness();
        let (order, _gw_id) = pending_order(&h).await;
        let err = h.service.initiate(USER + 1, order.order_id, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refund_paid_order_once() {
        let h = harness();
        let (order, gw_id) = pending_order(&h).await;
        h.gateway.set_order_status(&gw_id, "PAID");
        h.service
            .verify(USER, &PaymentRef::Order(order.order_id))
            .await
            .unwrap();

        assert!(h.service.refund(order.order_id, "RTO delivered", false).await.unwrap());
        assert!(!h.service.refund(order.order_id, "RTO delivered", false).await.unwrap());

        let stored = h.store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_refund_unpaid_order_is_noop() {
        let h = harness();
        let (order, _gw_id) = pending_order(&h).await;
        assert!(!h.service.refund(order.order_id, "canceled", false).await.unwrap());
    }
}
