//! Payment sessions and settlement
//!
//! One Payment row per attempt for an order. The reconciliation service is the
//! only mutator: it converts the gateway's asynchronous status into exactly-one
//! stock consumption or release per payment.
//!
//! # State Machine
//!
//! ```text
//! UNPAID ──▶ PAID ──▶ REFUNDED       (shipment policy actions)
//!    │
//!    ├────▶ FAILED
//!    └────▶ DROPPED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **CAS transitions**: every status movement is `UPDATE ... WHERE status =
//!    expected`; the CAS loser re-reads and short-circuits on the winner's
//!    terminal state.
//! 2. **Idempotent settlement**: verifying an already-PAID payment consumes
//!    nothing twice and never re-contacts the gateway.
//! 3. **Payment and order move together**: the settlement store writes
//!    `payments_tb.status` and `orders_tb.{status,payment_status}` in one
//!    transaction, never independently.
//! 4. **Fail toward pending**: unknown gateway vocabulary and gateway fetch
//!    failures both leave the payment UNPAID.

pub mod error;
pub mod fulfillment;
pub mod gateway;
pub mod memory;
pub mod models;
pub mod pg;
pub mod reconcile;
pub mod retry;
pub mod store;

pub use error::PaymentError;
pub use fulfillment::{FulfillmentHook, NoopFulfillment};
pub use gateway::{
    GatewayError, GatewayOrder, GatewaySession, HttpPaymentGateway, MockPaymentGateway,
    PaymentGateway, SessionRequest, normalize_status,
};
pub use memory::MemorySettlementStore;
pub use models::{PaymentRecord, PaymentStatus};
pub use pg::PgSettlementStore;
pub use reconcile::{InitiateOutcome, ReconciliationService, VerifyOutcome};
pub use retry::RetryPolicy;
pub use store::{PaymentRef, SettlementStore};
