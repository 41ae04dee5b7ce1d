//! Threadline - Inventory Reservation & Payment-Settlement Engine
//!
//! Sells finite-quantity apparel variants (product x color x size) without
//! overselling while checkout, asynchronous payment confirmation, and
//! third-party shipment updates race against each other.
//!
//! # Modules
//!
//! - [`core_types`] - Shared id types, `VariantKey`, `LineItem`
//! - [`stock`] - Stock ledger contract, reservation manager, expiry sweep
//! - [`payment`] - Gateway adapter, retry policy, settlement store, reconciliation
//! - [`order`] - Order record and lifecycle status ids
//! - [`shipment`] - Logistics status-code translator and tracker
//! - [`checkout`] - Orchestrator composing reserve / order / initiate
//! - [`api`] - HTTP surface (axum)
//! - [`db`] - Postgres pool and schema bootstrap

pub mod core_types;

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;

pub mod order;
pub mod payment;
pub mod shipment;
pub mod stock;

pub mod checkout;

pub mod api;

// Convenient re-exports at crate root
pub use checkout::CheckoutOrchestrator;
pub use core_types::{CheckoutId, LineItem, OrderId, PaymentId, UserId, VariantKey};
pub use order::{Order, OrderStatus};
pub use payment::{
    PaymentError, PaymentGateway, PaymentRef, PaymentStatus, ReconciliationService, RetryPolicy,
    SettlementStore,
};
pub use shipment::{OrderLifecycle, PolicyAction, ShipmentTracker, map_code};
pub use stock::{ReservationManager, StockError, StockLedger, SweepWorker};
