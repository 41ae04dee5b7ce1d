//! Checkout and reservation records
//!
//! Status ids are SMALLINT values for PostgreSQL storage; negative ids are the
//! released/expired side, mirroring the convention used across the codebase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core_types::{CheckoutId, UserId, VariantKey};

/// Checkout lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum CheckoutStatus {
    /// Reservations held, awaiting payment
    Processing = 0,
    /// Terminal: stock consumed, order created
    Completed = 10,
    /// Terminal: released explicitly (abandon / payment failure)
    Cancelled = -10,
    /// Terminal: reclaimed by the expiry sweep
    Expired = -20,
}

impl CheckoutStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CheckoutStatus::Processing)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(CheckoutStatus::Processing),
            10 => Some(CheckoutStatus::Completed),
            -10 => Some(CheckoutStatus::Cancelled),
            -20 => Some(CheckoutStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Processing => "PROCESSING",
            CheckoutStatus::Completed => "COMPLETED",
            CheckoutStatus::Cancelled => "CANCELLED",
            CheckoutStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for CheckoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reservation lifecycle states
///
/// Every transition out of ACTIVE is terminal: a row changes state at most
/// once, which is what makes release/consume idempotent under races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum ReservationStatus {
    /// Quantity is held out of the sellable pool
    Active = 0,
    /// Terminal: hold became a permanent decrement (payment settled)
    Consumed = 10,
    /// Terminal: quantity restored to the sellable pool
    Released = -10,
    /// Terminal: TTL lapsed, quantity restored by the sweep
    Expired = -20,
}

impl ReservationStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ReservationStatus::Active),
            10 => Some(ReservationStatus::Consumed),
            -10 => Some(ReservationStatus::Released),
            -20 => Some(ReservationStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Consumed => "CONSUMED",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One in-progress purchase attempt for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub checkout_id: CheckoutId,
    pub user_id: UserId,
    pub status: CheckoutStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Checkout {
    pub fn new(user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        Self {
            checkout_id: Uuid::new_v4(),
            user_id,
            status: CheckoutStatus::Processing,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Whether the reservation window is still open at `now`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == CheckoutStatus::Processing && now < self.expires_at
    }
}

/// A temporary hold on one variant inside a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub checkout_id: CheckoutId,
    pub variant: VariantKey,
    pub quantity: i32,
    pub reserved_until: DateTime<Utc>,
    pub status: ReservationStatus,
}

/// A checkout together with its reservations, as returned by `reserve`
#[derive(Debug, Clone)]
pub struct CheckoutHold {
    pub checkout: Checkout,
    pub reservations: Vec<Reservation>,
}
