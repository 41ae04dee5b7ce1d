//! Checkout orchestration
//!
//! Sequences reserve, order creation, and payment initiation. Owns no state
//! and no algorithmic decisions; every invariant lives in the stock ledger
//! and the reconciliation service.

pub mod orchestrator;

pub use orchestrator::{CheckoutLine, CheckoutOrchestrator, CreateOrderOutcome, CreateOrderRequest};
