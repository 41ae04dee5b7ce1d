//! Core types used throughout the system
//!
//! Fundamental id aliases and the variant key shared by all modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User ID - assigned by the upstream auth service, immutable.
pub type UserId = i64;

/// Product ID - catalog primary key (the catalog itself lives upstream).
pub type ProductId = i64;

/// Color ID - per-product color option.
pub type ColorId = i32;

/// Size ID - per-product size option.
pub type SizeId = i32;

/// Checkout ID - one in-progress purchase attempt.
pub type CheckoutId = Uuid;

/// Order ID - one persisted order.
pub type OrderId = Uuid;

/// Payment ID - one payment attempt for an order.
pub type PaymentId = Uuid;

/// A sellable apparel variant: product x color x size.
///
/// This is the unit the stock ledger counts. Two line items with the same
/// `VariantKey` compete for the same physical stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantKey {
    pub product_id: ProductId,
    pub color_id: ColorId,
    pub size_id: SizeId,
}

impl VariantKey {
    pub fn new(product_id: ProductId, color_id: ColorId, size_id: SizeId) -> Self {
        Self {
            product_id,
            color_id,
            size_id,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.product_id, self.color_id, self.size_id)
    }
}

/// One requested line inside a checkout: a variant and a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub variant: VariantKey,
    pub quantity: i32,
}

impl LineItem {
    pub fn new(variant: VariantKey, quantity: i32) -> Self {
        Self { variant, quantity }
    }
}
