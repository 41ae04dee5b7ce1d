//! In-process stock ledger
//!
//! Mutex-guarded ledger used by the state-machine tests and mock wiring. A
//! single lock around every operation gives the same atomicity the Postgres
//! implementation gets from its transactions. The clock can be offset forward
//! so TTL behavior is testable without real waiting.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use uuid::Uuid;

use super::ledger::{StockError, StockLedger};
use super::models::{Checkout, CheckoutHold, CheckoutStatus, Reservation, ReservationStatus};
use crate::core_types::{CheckoutId, LineItem, UserId, VariantKey};

#[derive(Default)]
struct Inner {
    stock: HashMap<VariantKey, i64>,
    sold: HashMap<VariantKey, i64>,
    checkouts: HashMap<CheckoutId, Checkout>,
    reservations: HashMap<CheckoutId, Vec<Reservation>>,
}

pub struct MemoryStockLedger {
    inner: Mutex<Inner>,
    clock_offset: Mutex<ChronoDuration>,
    /// Ledger-effect counters for verification
    consume_effects: AtomicUsize,
    release_effects: AtomicUsize,
}

impl Default for MemoryStockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStockLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock_offset: Mutex::new(ChronoDuration::zero()),
            consume_effects: AtomicUsize::new(0),
            release_effects: AtomicUsize::new(0),
        }
    }

    /// Set the sellable count for a variant.
    pub fn seed_stock(&self, variant: VariantKey, quantity: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.stock.insert(variant, quantity);
    }

    /// Move the ledger's clock forward; subsequent TTL checks see the offset.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.clock_offset.lock().unwrap();
        *offset += ChronoDuration::from_std(by).expect("offset out of range");
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now() + *self.clock_offset.lock().unwrap()
    }

    /// Number of checkouts whose consumption actually hit the ledger.
    pub fn consume_effects(&self) -> usize {
        self.consume_effects.load(Ordering::SeqCst)
    }

    /// Number of checkouts whose release actually restored stock.
    pub fn release_effects(&self) -> usize {
        self.release_effects.load(Ordering::SeqCst)
    }

    /// Permanently sold units for a variant.
    pub fn sold(&self, variant: &VariantKey) -> i64 {
        let inner = self.inner.lock().unwrap();
        inner.sold.get(variant).copied().unwrap_or(0)
    }

    fn hold_for(inner: &Inner, checkout_id: CheckoutId) -> Option<CheckoutHold> {
        let checkout = inner.checkouts.get(&checkout_id)?.clone();
        let reservations = inner
            .reservations
            .get(&checkout_id)
            .cloned()
            .unwrap_or_default();
        Some(CheckoutHold {
            checkout,
            reservations,
        })
    }
}

#[async_trait]
impl StockLedger for MemoryStockLedger {
    async fn reserve(
        &self,
        user_id: UserId,
        items: &[LineItem],
        ttl: Duration,
    ) -> Result<CheckoutHold, StockError> {
        if items.is_empty() || items.iter().any(|i| i.quantity <= 0) {
            return Err(StockError::InvalidQuantity);
        }

        let now = self.now();
        let reserved_until = now + ChronoDuration::from_std(ttl).expect("ttl out of range");

        let mut inner = self.inner.lock().unwrap();

        // Check the whole batch first: no partial reservation.
        for item in items {
            let available = *inner
                .stock
                .get(&item.variant)
                .ok_or(StockError::UnknownVariant(item.variant))?;
            if available < item.quantity as i64 {
                return Err(StockError::InsufficientStock {
                    variant: item.variant,
                    requested: item.quantity,
                    available,
                });
            }
        }

        let mut checkout = Checkout::new(user_id, reserved_until);
        checkout.created_at = now;
        let checkout_id = checkout.checkout_id;

        let mut reservations = Vec::with_capacity(items.len());
        for item in items {
            *inner.stock.get_mut(&item.variant).unwrap() -= item.quantity as i64;
            reservations.push(Reservation {
                reservation_id: Uuid::new_v4(),
                checkout_id,
                variant: item.variant,
                quantity: item.quantity,
                reserved_until,
                status: ReservationStatus::Active,
            });
        }

        inner.checkouts.insert(checkout_id, checkout.clone());
        inner.reservations.insert(checkout_id, reservations.clone());

        Ok(CheckoutHold {
            checkout,
            reservations,
        })
    }

    async fn release(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.checkouts.contains_key(&checkout_id) {
            return Err(StockError::CheckoutNotFound(checkout_id));
        }

        let mut restored = Vec::new();
        let mut released = 0u64;
        if let Some(reservations) = inner.reservations.get_mut(&checkout_id) {
            for r in reservations.iter_mut() {
                if r.status == ReservationStatus::Active {
                    r.status = ReservationStatus::Released;
                    restored.push((r.variant, r.quantity as i64));
                    released += 1;
                }
            }
        }
        for (variant, qty) in restored {
            *inner.stock.entry(variant).or_insert(0) += qty;
        }

        if released > 0 {
            let checkout = inner.checkouts.get_mut(&checkout_id).unwrap();
            if checkout.status == CheckoutStatus::Processing {
                checkout.status = CheckoutStatus::Cancelled;
            }
            self.release_effects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(released)
    }

    async fn consume(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.checkouts.contains_key(&checkout_id) {
            return Err(StockError::CheckoutNotFound(checkout_id));
        }

        let mut sold = Vec::new();
        let mut consumed = 0u64;
        if let Some(reservations) = inner.reservations.get_mut(&checkout_id) {
            for r in reservations.iter_mut() {
                if r.status == ReservationStatus::Active {
                    r.status = ReservationStatus::Consumed;
                    sold.push((r.variant, r.quantity as i64));
                    consumed += 1;
                }
            }
        }
        for (variant, qty) in sold {
            *inner.sold.entry(variant).or_insert(0) += qty;
        }

        if consumed > 0 {
            let checkout = inner.checkouts.get_mut(&checkout_id).unwrap();
            if checkout.status == CheckoutStatus::Processing {
                checkout.status = CheckoutStatus::Completed;
            }
            self.consume_effects.fetch_add(1, Ordering::SeqCst);
        }
        Ok(consumed)
    }

    async fn sweep_expired(&self) -> Result<u64, StockError> {
        let now = self.now();
        let mut inner = self.inner.lock().unwrap();

        let mut restored = Vec::new();
        let mut expired_checkouts = Vec::new();
        let mut expired = 0u64;
        for (checkout_id, reservations) in inner.reservations.iter_mut() {
            for r in reservations.iter_mut() {
                if r.status == ReservationStatus::Active && r.reserved_until < now {
                    r.status = ReservationStatus::Expired;
                    restored.push((r.variant, r.quantity as i64));
                    expired_checkouts.push(*checkout_id);
                    expired += 1;
                }
            }
        }
        for (variant, qty) in restored {
            *inner.stock.entry(variant).or_insert(0) += qty;
        }
        for checkout_id in expired_checkouts {
            if let Some(checkout) = inner.checkouts.get_mut(&checkout_id)
                && checkout.status == CheckoutStatus::Processing
            {
                checkout.status = CheckoutStatus::Expired;
            }
        }
        Ok(expired)
    }

    async fn find_processing_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Option<CheckoutHold>, StockError> {
        let inner = self.inner.lock().unwrap();
        let latest = inner
            .checkouts
            .values()
            .filter(|c| c.user_id == user_id && c.status == CheckoutStatus::Processing)
            .max_by_key(|c| c.created_at)
            .map(|c| c.checkout_id);
        Ok(latest.and_then(|id| Self::hold_for(&inner, id)))
    }

    async fn get_checkout(
        &self,
        checkout_id: CheckoutId,
    ) -> Result<Option<CheckoutHold>, StockError> {
        let inner = self.inner.lock().unwrap();
        Ok(Self::hold_for(&inner, checkout_id))
    }

    async fn available(&self, variant: &VariantKey) -> Result<i64, StockError> {
        let inner = self.inner.lock().unwrap();
        inner
            .stock
            .get(variant)
            .copied()
            .ok_or(StockError::UnknownVariant(*variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn variant() -> VariantKey {
        VariantKey::new(1, 1, 1)
    }

    fn one_of(v: VariantKey) -> Vec<LineItem> {
        vec![LineItem::new(v, 1)]
    }

    const TTL: Duration = Duration::from_secs(900);

    #[tokio::test]
    async fn test_reserve_decrements_stock() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 5);

        let hold = ledger.reserve(1, &one_of(variant()), TTL).await.unwrap();
        assert_eq!(hold.reservations.len(), 1);
        assert_eq!(hold.checkout.status, CheckoutStatus::Processing);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_variant() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 2);

        let err = ledger
            .reserve(1, &[LineItem::new(variant(), 3)], TTL)
            .await
            .unwrap_err();
        match err {
            StockError::InsufficientStock {
                variant: v,
                requested,
                available,
            } => {
                assert_eq!(v, variant());
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        // denied batch reserves nothing
        assert_eq!(ledger.available(&variant()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_no_partial_reservation() {
        let ledger = MemoryStockLedger::new();
        let a = VariantKey::new(1, 1, 1);
        let b = VariantKey::new(2, 1, 1);
        ledger.seed_stock(a, 5);
        ledger.seed_stock(b, 0);

        let items = vec![LineItem::new(a, 1), LineItem::new(b, 1)];
        assert!(ledger.reserve(1, &items, TTL).await.is_err());
        // the stocked variant must not be touched
        assert_eq!(ledger.available(&a).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 5);
        let hold = ledger.reserve(1, &one_of(variant()), TTL).await.unwrap();
        let id = hold.checkout.checkout_id;

        assert_eq!(ledger.release(id).await.unwrap(), 1);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 5);

        // second release: no-op, never double-restores
        assert_eq!(ledger.release(id).await.unwrap(), 0);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 5);
        assert_eq!(ledger.release_effects(), 1);
    }

    #[tokio::test]
    async fn test_consume_is_idempotent() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 5);
        let hold = ledger.reserve(1, &one_of(variant()), TTL).await.unwrap();
        let id = hold.checkout.checkout_id;

        assert_eq!(ledger.consume(id).await.unwrap(), 1);
        assert_eq!(ledger.consume(id).await.unwrap(), 0);
        assert_eq!(ledger.consume_effects(), 1);

        // consumed stock stays decremented and is recorded as sold
        assert_eq!(ledger.available(&variant()).await.unwrap(), 4);
        assert_eq!(ledger.sold(&variant()), 1);

        // release after consume is a no-op, not an error
        assert_eq!(ledger.release(id).await.unwrap(), 0);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_sweep_restores_expired_reservations() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 5);
        let hold = ledger.reserve(1, &one_of(variant()), TTL).await.unwrap();

        // before expiry, the hold still blocks a too-large reservation
        assert!(ledger.reserve(2, &[LineItem::new(variant(), 5)], TTL).await.is_err());

        ledger.advance(Duration::from_secs(901));

        // past due but unswept: the hold still blocks (the sweep performs the
        // release side effect, not wall clock alone)
        assert_eq!(ledger.available(&variant()).await.unwrap(), 4);

        assert_eq!(ledger.sweep_expired().await.unwrap(), 1);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 5);

        // the expired checkout can no longer be consumed
        assert_eq!(ledger.consume(hold.checkout.checkout_id).await.unwrap(), 0);
        assert_eq!(ledger.sold(&variant()), 0);

        // second sweep finds nothing
        assert_eq!(ledger.sweep_expired().await.unwrap(), 0);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_no_oversell_under_concurrent_reserves() {
        let ledger = Arc::new(MemoryStockLedger::new());
        ledger.seed_stock(variant(), 10);

        let mut handles = Vec::new();
        for user in 0..32i64 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(user, &one_of(variant()), TTL).await.is_ok()
            }));
        }

        let mut successes = 0;
        for h in handles {
            if h.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 10);
        assert_eq!(ledger.available(&variant()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_processing_checkout_returns_latest() {
        let ledger = MemoryStockLedger::new();
        ledger.seed_stock(variant(), 5);

        let first = ledger.reserve(7, &one_of(variant()), TTL).await.unwrap();
        // make creation times strictly ordered
        ledger.advance(Duration::from_secs(1));
        let second = ledger.reserve(7, &one_of(variant()), TTL).await.unwrap();

        let found = ledger.find_processing_checkout(7).await.unwrap().unwrap();
        assert_eq!(found.checkout.checkout_id, second.checkout.checkout_id);

        ledger.release(second.checkout.checkout_id).await.unwrap();
        let found = ledger.find_processing_checkout(7).await.unwrap().unwrap();
        assert_eq!(found.checkout.checkout_id, first.checkout.checkout_id);
    }
}
