//! Internal lifecycle buckets and policy actions derived from shipment codes

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::order::OrderStatus;

/// The closed set of lifecycle buckets a shipment code folds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderLifecycle {
    New,
    ReadyToShip,
    PickupScheduled,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Canceled,
    ReturnInitiated,
    ReturnInTransit,
    Returned,
    RtoInitiated,
    RtoDelivered,
    Failed,
    Exception,
}

impl OrderLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderLifecycle::New => "new",
            OrderLifecycle::ReadyToShip => "ready_to_ship",
            OrderLifecycle::PickupScheduled => "pickup_scheduled",
            OrderLifecycle::Shipped => "shipped",
            OrderLifecycle::InTransit => "in_transit",
            OrderLifecycle::OutForDelivery => "out_for_delivery",
            OrderLifecycle::Delivered => "delivered",
            OrderLifecycle::Canceled => "canceled",
            OrderLifecycle::ReturnInitiated => "return_initiated",
            OrderLifecycle::ReturnInTransit => "return_in_transit",
            OrderLifecycle::Returned => "returned",
            OrderLifecycle::RtoInitiated => "rto_initiated",
            OrderLifecycle::RtoDelivered => "rto_delivered",
            OrderLifecycle::Failed => "failed",
            OrderLifecycle::Exception => "exception",
        }
    }
}

impl fmt::Display for OrderLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<OrderLifecycle> for OrderStatus {
    fn from(bucket: OrderLifecycle) -> Self {
        match bucket {
            OrderLifecycle::New => OrderStatus::Confirmed,
            OrderLifecycle::ReadyToShip => OrderStatus::ReadyToShip,
            OrderLifecycle::PickupScheduled => OrderStatus::PickupScheduled,
            OrderLifecycle::Shipped => OrderStatus::Shipped,
            OrderLifecycle::InTransit => OrderStatus::InTransit,
            OrderLifecycle::OutForDelivery => OrderStatus::OutForDelivery,
            OrderLifecycle::Delivered => OrderStatus::Delivered,
            OrderLifecycle::Canceled => OrderStatus::Cancelled,
            OrderLifecycle::ReturnInitiated => OrderStatus::ReturnInitiated,
            OrderLifecycle::ReturnInTransit => OrderStatus::ReturnInTransit,
            OrderLifecycle::Returned => OrderStatus::Returned,
            OrderLifecycle::RtoInitiated => OrderStatus::RtoInitiated,
            OrderLifecycle::RtoDelivered => OrderStatus::RtoDelivered,
            OrderLifecycle::Failed => OrderStatus::DeliveryFailed,
            OrderLifecycle::Exception => OrderStatus::Exception,
        }
    }
}

/// What the engine must do when a shipment enters a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    NoAction,
    CreateReturnRequest,
    CreateRefund,
    ManualCheckAndRefund,
    ImmediateRefund,
    ManualCheck,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::NoAction => "no_action",
            PolicyAction::CreateReturnRequest => "create_return_request",
            PolicyAction::CreateRefund => "create_refund",
            PolicyAction::ManualCheckAndRefund => "manual_check_and_refund",
            PolicyAction::ImmediateRefund => "immediate_refund",
            PolicyAction::ManualCheck => "manual_check",
        }
    }

    /// Whether this action moves money back to the customer.
    pub fn refunds(&self) -> bool {
        matches!(
            self,
            PolicyAction::CreateRefund
                | PolicyAction::ImmediateRefund
                | PolicyAction::ManualCheckAndRefund
        )
    }

    /// Whether this action needs a human in the loop.
    pub fn needs_review(&self) -> bool {
        matches!(
            self,
            PolicyAction::ManualCheck | PolicyAction::ManualCheckAndRefund
        )
    }
}

impl fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
