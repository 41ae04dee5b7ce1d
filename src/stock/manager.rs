//! Reservation Manager
//!
//! Translates checkout-level intents into stock ledger calls. Callers that
//! know the checkout id use the explicit `*_checkout` variants; the
//! user-scoped variants fall back to the user's latest PROCESSING checkout by
//! creation time.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::ledger::{StockError, StockLedger};
use super::models::CheckoutHold;
use crate::core_types::{CheckoutId, LineItem, UserId};

pub struct ReservationManager {
    ledger: Arc<dyn StockLedger>,
    ttl: Duration,
}

impl ReservationManager {
    pub fn new(ledger: Arc<dyn StockLedger>, ttl: Duration) -> Self {
        Self { ledger, ttl }
    }

    pub fn ledger(&self) -> &Arc<dyn StockLedger> {
        &self.ledger
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reserve stock for a new checkout.
    ///
    /// A user has at most one authoritative PROCESSING checkout: starting a
    /// new one supersedes the previous one, whose reservations are released
    /// before the new hold is taken.
    pub async fn reserve_for_checkout(
        &self,
        user_id: UserId,
        items: &[LineItem],
    ) -> Result<CheckoutHold, StockError> {
        if let Some(previous) = self.ledger.find_processing_checkout(user_id).await? {
            let released = self.ledger.release(previous.checkout.checkout_id).await?;
            info!(
                user_id = user_id,
                checkout_id = %previous.checkout.checkout_id,
                released = released,
                "Superseded previous processing checkout"
            );
        }

        self.ledger.reserve(user_id, items, self.ttl).await
    }

    /// Release a specific checkout's reservations. Ok(0) when already terminal.
    pub async fn release_checkout(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        self.ledger.release(checkout_id).await
    }

    /// Release the user's current PROCESSING checkout, if any.
    pub async fn release_for_user(&self, user_id: UserId) -> Result<u64, StockError> {
        match self.ledger.find_processing_checkout(user_id).await? {
            Some(hold) => self.ledger.release(hold.checkout.checkout_id).await,
            None => {
                debug!(user_id = user_id, "No processing checkout to release");
                Ok(0)
            }
        }
    }

    /// Consume a specific checkout's reservations. Ok(0) when already consumed.
    pub async fn consume_checkout(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        self.ledger.consume(checkout_id).await
    }

    /// Consume the user's current PROCESSING checkout. Tolerates the checkout
    /// being gone (already consumed): returns Ok(0), not an error.
    pub async fn consume_for_user(&self, user_id: UserId) -> Result<u64, StockError> {
        match self.ledger.find_processing_checkout(user_id).await? {
            Some(hold) => self.ledger.consume(hold.checkout.checkout_id).await,
            None => {
                debug!(user_id = user_id, "No processing checkout to consume");
                Ok(0)
            }
        }
    }

    /// Run the expiry sweep once. Invoked on the sweep interval and before
    /// payment initiation that depends on a live reservation window.
    pub async fn cleanup_expired(&self) -> Result<u64, StockError> {
        self.ledger.sweep_expired().await
    }

    /// Load a checkout by id.
    pub async fn get_checkout(
        &self,
        checkout_id: CheckoutId,
    ) -> Result<Option<CheckoutHold>, StockError> {
        self.ledger.get_checkout(checkout_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::VariantKey;
    use crate::stock::memory::MemoryStockLedger;
    use crate::stock::models::CheckoutStatus;

    const TTL: Duration = Duration::from_secs(900);

    fn setup(stock: i64) -> (Arc<MemoryStockLedger>, ReservationManager) {
        let ledger = Arc::new(MemoryStockLedger::new());
        ledger.seed_stock(VariantKey::new(1, 1, 1), stock);
        let manager = ReservationManager::new(ledger.clone(), TTL);
        (ledger, manager)
    }

    fn one_item() -> Vec<LineItem> {
        vec![LineItem::new(VariantKey::new(1, 1, 1), 1)]
    }

    #[tokio::test]
    async fn test_new_checkout_supersedes_previous() {
        let (ledger, manager) = setup(5);

        let first = manager.reserve_for_checkout(9, &one_item()).await.unwrap();
        let second = manager.reserve_for_checkout(9, &one_item()).await.unwrap();

        // the first hold was released, so only one unit is held in total
        assert_eq!(ledger.available(&VariantKey::new(1, 1, 1)).await.unwrap(), 4);

        let first_now = ledger
            .get_checkout(first.checkout.checkout_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first_now.checkout.status, CheckoutStatus::Cancelled);

        let found = ledger.find_processing_checkout(9).await.unwrap().unwrap();
        assert_eq!(found.checkout.checkout_id, second.checkout.checkout_id);
    }

    #[tokio::test]
    async fn test_consume_for_user_tolerates_missing_checkout() {
        let (_ledger, manager) = setup(5);
        // no checkout at all: success, not an error
        assert_eq!(manager.consume_for_user(42).await.unwrap(), 0);

        manager.reserve_for_checkout(42, &one_item()).await.unwrap();
        assert_eq!(manager.consume_for_user(42).await.unwrap(), 1);
        // checkout is COMPLETED now, the fallback finds nothing
        assert_eq!(manager.consume_for_user(42).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_for_user() {
        let (ledger, manager) = setup(5);
        manager.reserve_for_checkout(7, &one_item()).await.unwrap();
        assert_eq!(ledger.available(&VariantKey::new(1, 1, 1)).await.unwrap(), 4);

        assert_eq!(manager.release_for_user(7).await.unwrap(), 1);
        assert_eq!(ledger.available(&VariantKey::new(1, 1, 1)).await.unwrap(), 5);
        assert_eq!(manager.release_for_user(7).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (ledger, manager) = setup(5);
        manager.reserve_for_checkout(7, &one_item()).await.unwrap();

        ledger.advance(Duration::from_secs(901));
        assert_eq!(manager.cleanup_expired().await.unwrap(), 1);
        assert_eq!(ledger.available(&VariantKey::new(1, 1, 1)).await.unwrap(), 5);
    }
}
