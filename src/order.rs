//! Order record and lifecycle states
//!
//! An order starts PENDING, becomes CONFIRMED or CANCELLED at settlement, and
//! is later overwritten by shipment-derived states as tracking updates arrive.
//! `status` and `payment_status` are always written together by the settlement
//! store, never independently.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core_types::{CheckoutId, OrderId, UserId};
use crate::payment::models::PaymentStatus;

/// Order states stored as SMALLINT ids.
///
/// 0/10/-10 are the settlement-driven states; 20+ are overwritten by the
/// shipment tracker once the order is in the courier's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Pending = 0,
    Confirmed = 10,
    Cancelled = -10,

    ReadyToShip = 20,
    PickupScheduled = 21,
    Shipped = 22,
    InTransit = 23,
    OutForDelivery = 24,
    Delivered = 30,

    ReturnInitiated = 40,
    ReturnInTransit = 41,
    Returned = 42,
    RtoInitiated = 43,
    RtoDelivered = 44,

    DeliveryFailed = -20,
    Exception = -30,
}

impl OrderStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(OrderStatus::Pending),
            10 => Some(OrderStatus::Confirmed),
            -10 => Some(OrderStatus::Cancelled),
            20 => Some(OrderStatus::ReadyToShip),
            21 => Some(OrderStatus::PickupScheduled),
            22 => Some(OrderStatus::Shipped),
            23 => Some(OrderStatus::InTransit),
            24 => Some(OrderStatus::OutForDelivery),
            30 => Some(OrderStatus::Delivered),
            40 => Some(OrderStatus::ReturnInitiated),
            41 => Some(OrderStatus::ReturnInTransit),
            42 => Some(OrderStatus::Returned),
            43 => Some(OrderStatus::RtoInitiated),
            44 => Some(OrderStatus::RtoDelivered),
            -20 => Some(OrderStatus::DeliveryFailed),
            -30 => Some(OrderStatus::Exception),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::ReadyToShip => "READY_TO_SHIP",
            OrderStatus::PickupScheduled => "PICKUP_SCHEDULED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::ReturnInitiated => "RETURN_INITIATED",
            OrderStatus::ReturnInTransit => "RETURN_IN_TRANSIT",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::RtoInitiated => "RTO_INITIATED",
            OrderStatus::RtoDelivered => "RTO_DELIVERED",
            OrderStatus::DeliveryFailed => "DELIVERY_FAILED",
            OrderStatus::Exception => "EXCEPTION",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub checkout_id: CheckoutId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub shipping_address_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: UserId,
        checkout_id: CheckoutId,
        total_amount: Decimal,
        shipping_address_id: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4(),
            user_id,
            checkout_id,
            total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: None,
            shipping_address_id,
            created_at: now,
            updated_at: now,
        }
    }
}
