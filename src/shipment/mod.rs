//! Shipment tracking feed
//!
//! The logistics provider speaks a vocabulary of ~90 numeric status codes.
//! `status_map` folds that vocabulary into a small internal lifecycle enum
//! plus a policy action, and `tracker` applies both to the order record.
//! Codes we have never seen resolve to `(Exception, ManualCheck)`; an unknown
//! code must never silently look like a safe state.

pub mod lifecycle;
pub mod status_map;
pub mod tracker;

pub use lifecycle::{OrderLifecycle, PolicyAction};
pub use status_map::map_code;
pub use tracker::{ShipmentTracker, TrackingOutcome};
