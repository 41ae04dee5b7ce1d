//! Stock Ledger & Reservation Manager
//!
//! The authoritative per-variant stock counts and the temporal reservation
//! ledger on top of them.
//!
//! # Lifecycle
//!
//! ```text
//! reserve ──▶ ACTIVE ──▶ CONSUMED   (payment settled)
//!                 │
//!                 ├────▶ RELEASED   (cancelled / payment failed)
//!                 └────▶ EXPIRED    (TTL lapsed, reclaimed by the sweep)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Atomic check-and-decrement**: reserve/release/consume/sweep are each a
//!    single transaction in the backing store; no check is ever split from its
//!    write across round trips.
//! 2. **No partial reservation**: a batch reserves in full or not at all.
//! 3. **Terminal transitions**: each reservation leaves ACTIVE at most once,
//!    so release and consume are idempotent and safe to race.

pub mod ledger;
pub mod manager;
pub mod memory;
pub mod models;
pub mod pg;
pub mod sweeper;

pub use ledger::{StockError, StockLedger};
pub use manager::ReservationManager;
pub use memory::MemoryStockLedger;
pub use models::{Checkout, CheckoutHold, CheckoutStatus, Reservation, ReservationStatus};
pub use pg::PgStockLedger;
pub use sweeper::{SweepWorker, SweeperConfig};
