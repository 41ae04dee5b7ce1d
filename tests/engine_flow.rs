//! End-to-end engine scenarios over the in-memory backends.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use threadline::checkout::{CheckoutLine, CheckoutOrchestrator, CreateOrderRequest};
use threadline::payment::{
    MemorySettlementStore, MockPaymentGateway, NoopFulfillment, PaymentRef, PaymentStatus,
    ReconciliationService, RetryPolicy, SettlementStore,
};
use threadline::shipment::ShipmentTracker;
use threadline::stock::{MemoryStockLedger, ReservationManager, StockLedger};
use threadline::{OrderStatus, UserId, VariantKey};

const USER: UserId = 1001;

struct Engine {
    orchestrator: CheckoutOrchestrator,
    reconciliation: Arc<ReconciliationService>,
    tracker: ShipmentTracker,
    store: Arc<MemorySettlementStore>,
    gateway: Arc<MockPaymentGateway>,
    ledger: Arc<MemoryStockLedger>,
    manager: Arc<ReservationManager>,
}

fn engine() -> Engine {
    let ledger = Arc::new(MemoryStockLedger::new());
    let manager = Arc::new(ReservationManager::new(
        ledger.clone(),
        Duration::from_secs(15 * 60),
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
    let orchestrator = CheckoutOrchestrator::new(
        manager.clone(),
        store.clone(),
        reconciliation.clone(),
    );
    let tracker = ShipmentTracker::new(store.clone(), reconciliation.clone());
    Engine {
        orchestrator,
        reconciliation,
        tracker,
        store,
        gateway,
        ledger,
        manager,
    }
}

fn variant() -> VariantKey {
    VariantKey::new(100, 1, 42)
}

fn request(qty: i32, method: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        items: vec![CheckoutLine {
            product_id: 100,
            color_id: 1,
            size_id: 42,
            quantity: qty,
            unit_price: Decimal::new(99900, 2),
        }],
        payment_method: method.to_string(),
        shipping_address_id: Some(1),
    }
}

#[tokio::test]
async fn happy_path_reserve_pay_verify() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(1, "upi")).await.unwrap();
    assert!(outcome.payment_required);
    let session = outcome.session.expect("session should be open");

    // hold taken
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 4);

    e.gateway.set_order_status(&session.gateway_order_id, "PAID");
    let verified = e
        .reconciliation
        .verify(USER, &PaymentRef::Order(outcome.order_id))
        .await
        .unwrap();
    assert_eq!(verified.payment_status, PaymentStatus::Paid);
    assert_eq!(verified.order_status, OrderStatus::Confirmed);

    // decrement made permanent
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 4);
    assert_eq!(e.ledger.sold(&variant()), 1);

    let order = e.store.get_order(outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(order.status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn expired_checkout_restores_stock_and_never_consumes() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(1, "upi")).await.unwrap();
    let session = outcome.session.unwrap();

    // customer walks away; TTL lapses and the sweep reclaims the hold
    e.ledger.advance(Duration::from_secs(16 * 60));
    assert_eq!(e.manager.cleanup_expired().await.unwrap(), 1);
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 5);

    // gateway later reports the session as expired
    e.gateway.set_order_status(&session.gateway_order_id, "EXPIRED");
    let verified = e
        .reconciliation
        .verify(USER, &PaymentRef::Order(outcome.order_id))
        .await
        .unwrap();
    assert_eq!(verified.payment_status, PaymentStatus::Dropped);

    // nothing was consumed and nothing was double-restored
    assert_eq!(e.ledger.sold(&variant()), 0);
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 5);
}

#[tokio::test]
async fn duplicate_initiation_returns_same_session() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(1, "card")).await.unwrap();
    let first = outcome.session.unwrap();

    let second = e
        .reconciliation
        .initiate(USER, outcome.order_id, Some("card"))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.gateway_order_id, first.gateway_order_id);
    assert_eq!(e.gateway.create_count(), 1);
}

#[tokio::test]
async fn concurrent_verifies_converge_with_one_consumption() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(2, "upi")).await.unwrap();
    let session = outcome.session.unwrap();
    e.gateway.set_order_status(&session.gateway_order_id, "PAID");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reconciliation = e.reconciliation.clone();
        let order_id = outcome.order_id;
        handles.push(tokio::spawn(async move {
            reconciliation
                .verify(USER, &PaymentRef::Order(order_id))
                .await
                .unwrap()
        }));
    }

    for joined in futures::future::join_all(handles).await {
        let verified = joined.unwrap();
        assert_eq!(verified.payment_status, PaymentStatus::Paid);
        assert_eq!(verified.order_status, OrderStatus::Confirmed);
    }

    // ledger effect happened exactly once
    assert_eq!(e.ledger.consume_effects(), 1);
    assert_eq!(e.ledger.sold(&variant()), 2);
}

#[tokio::test]
async fn new_checkout_supersedes_previous_hold() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let first = e.orchestrator.create_order(USER, &request(3, "upi")).await.unwrap();
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 2);

    // user edits the cart and checks out again
    let second = e.orchestrator.create_order(USER, &request(1, "upi")).await.unwrap();
    assert_ne!(second.order_id, first.order_id);

    // the first hold was released before the new one was taken
    assert_eq!(e.ledger.available(&variant()).await.unwrap(), 4);
    assert_eq!(e.ledger.release_effects(), 1);
}

#[tokio::test]
async fn shipment_feed_drives_lifecycle_and_refund() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(1, "upi")).await.unwrap();
    let session = outcome.session.unwrap();
    e.gateway.set_order_status(&session.gateway_order_id, "PAID");
    e.reconciliation
        .verify(USER, &PaymentRef::Order(outcome.order_id))
        .await
        .unwrap();

    // shipped, then delivered
    e.tracker.handle_update(outcome.order_id, 6).await.unwrap();
    e.tracker.handle_update(outcome.order_id, 7).await.unwrap();
    let order = e.store.get_order(outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.payment_status, PaymentStatus::Paid);

    // customer returns it; the return delivery triggers the refund
    let returned = e.tracker.handle_update(outcome.order_id, 86).await.unwrap();
    assert!(returned.refunded);
    let order = e.store.get_order(outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Returned);
    assert_eq!(order.payment_status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn cod_order_commits_stock_without_payment() {
    let e = engine();
    e.ledger.seed_stock(variant(), 5);

    let outcome = e.orchestrator.create_order(USER, &request(1, "cod")).await.unwrap();
    assert!(!outcome.payment_required);
    assert_eq!(e.ledger.sold(&variant()), 1);
    assert_eq!(e.gateway.create_count(), 0);

    let order = e.store.get_order(outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
}
