//! Payment status and record types
//!
//! Status ids are SMALLINT values for PostgreSQL storage.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core_types::{OrderId, PaymentId};

/// Payment states
///
/// UNPAID is the only state the reconciliation service will move; everything
/// else is settled. A fresh row is created for a new attempt, never a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum PaymentStatus {
    /// Session issued (or about to be), outcome unknown
    Unpaid = 0,
    /// Settled: gateway confirmed the charge
    Paid = 10,
    /// Settled: gateway reported failure
    Failed = -10,
    /// Settled: customer abandoned the session
    Dropped = -20,
    /// Money returned after settlement (shipment refund path)
    Refunded = -30,
}

impl PaymentStatus {
    /// Whether the final outcome of this payment attempt is known.
    #[inline]
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Unpaid)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PaymentStatus::Unpaid),
            10 => Some(PaymentStatus::Paid),
            -10 => Some(PaymentStatus::Failed),
            -20 => Some(PaymentStatus::Dropped),
            -30 => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Dropped => "DROPPED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One payment attempt for an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    /// The gateway's own order id, used for status fetches and webhooks
    pub gateway_order_id: String,
    /// Session handle the client uses to open the payment page
    pub session_id: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Opaque snapshot of the gateway's last response
    pub gateway_response: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        order_id: OrderId,
        gateway_order_id: String,
        session_id: String,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_id: Uuid::new_v4(),
            order_id,
            gateway_order_id,
            session_id,
            amount,
            status: PaymentStatus::Unpaid,
            gateway_response: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_roundtrip() {
        for s in [
            PaymentStatus::Unpaid,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Dropped,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::from_id(s.id()), Some(s));
        }
        assert_eq!(PaymentStatus::from_id(99), None);
    }

    #[test]
    fn test_settled_states() {
        assert!(!PaymentStatus::Unpaid.is_settled());
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Failed.is_settled());
        assert!(PaymentStatus::Dropped.is_settled());
        assert!(PaymentStatus::Refunded.is_settled());
    }

    #[test]
    fn test_display() {
        assert_eq!(PaymentStatus::Paid.to_string(), "PAID");
        assert_eq!(PaymentStatus::Dropped.to_string(), "DROPPED");
    }
}
