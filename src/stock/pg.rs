//! PostgreSQL stock ledger
//!
//! Every operation is one transaction. Reserve takes row locks with
//! `SELECT ... FOR UPDATE` so check-and-decrement is atomic per variant;
//! release/consume/sweep use conditional `UPDATE ... WHERE status = ACTIVE`
//! so each reservation row transitions at most once even under concurrent
//! callers.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;
use uuid::Uuid;

use super::ledger::{StockError, StockLedger};
use super::models::{Checkout, CheckoutHold, CheckoutStatus, Reservation, ReservationStatus};
use crate::core_types::{CheckoutId, LineItem, UserId, VariantKey};

pub struct PgStockLedger {
    pool: PgPool,
}

impl PgStockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_checkout(row: &PgRow) -> Result<Checkout, StockError> {
        let status_id: i16 = row.get("status");
        Ok(Checkout {
            checkout_id: row.get("checkout_id"),
            user_id: row.get("user_id"),
            status: CheckoutStatus::from_id(status_id)
                .ok_or_else(|| StockError::Database(format!("bad checkout status {status_id}")))?,
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        })
    }

    fn row_to_reservation(row: &PgRow) -> Result<Reservation, StockError> {
        let status_id: i16 = row.get("status");
        Ok(Reservation {
            reservation_id: row.get("reservation_id"),
            checkout_id: row.get("checkout_id"),
            variant: VariantKey::new(row.get("product_id"), row.get("color_id"), row.get("size_id")),
            quantity: row.get("quantity"),
            reserved_until: row.get("reserved_until"),
            status: ReservationStatus::from_id(status_id).ok_or_else(|| {
                StockError::Database(format!("bad reservation status {status_id}"))
            })?,
        })
    }

    async fn load_reservations(
        &self,
        checkout_id: CheckoutId,
    ) -> Result<Vec<Reservation>, StockError> {
        let rows = sqlx::query(
            r#"
            SELECT reservation_id, checkout_id, product_id, color_id, size_id,
                   quantity, reserved_until, status
            FROM reservations_tb
            WHERE checkout_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(checkout_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_reservation).collect()
    }

    async fn checkout_exists(&self, checkout_id: CheckoutId) -> Result<bool, StockError> {
        let row = sqlx::query("SELECT 1 FROM checkouts_tb WHERE checkout_id = $1")
            .bind(checkout_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl StockLedger for PgStockLedger {
    async fn reserve(
        &self,
        user_id: UserId,
        items: &[LineItem],
        ttl: Duration,
    ) -> Result<CheckoutHold, StockError> {
        if items.is_empty() || items.iter().any(|i| i.quantity <= 0) {
            return Err(StockError::InvalidQuantity);
        }

        let mut tx = self.pool.begin().await?;

        // Lock and check every variant before decrementing anything. A failed
        // check drops the transaction, so no partial reservation survives.
        for item in items {
            let row = sqlx::query(
                r#"
                SELECT available FROM variants_tb
                WHERE product_id = $1 AND color_id = $2 AND size_id = $3
                FOR UPDATE
                "#,
            )
            .bind(item.variant.product_id)
            .bind(item.variant.color_id)
            .bind(item.variant.size_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StockError::UnknownVariant(item.variant))?;

            let available: i64 = row.get("available");
            if available < item.quantity as i64 {
                return Err(StockError::InsufficientStock {
                    variant: item.variant,
                    requested: item.quantity,
                    available,
                });
            }

            sqlx::query(
                r#"
                UPDATE variants_tb
                SET available = available - $1, updated_at = NOW()
                WHERE product_id = $2 AND color_id = $3 AND size_id = $4
                "#,
            )
            .bind(item.quantity as i64)
            .bind(item.variant.product_id)
            .bind(item.variant.color_id)
            .bind(item.variant.size_id)
            .execute(&mut *tx)
            .await?;
        }

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StockError::Database(format!("ttl out of range: {e}")))?;
        let checkout = Checkout::new(user_id, chrono::Utc::now() + ttl);

        sqlx::query(
            r#"
            INSERT INTO checkouts_tb (checkout_id, user_id, status, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(checkout.checkout_id)
        .bind(checkout.user_id)
        .bind(checkout.status.id())
        .bind(checkout.expires_at)
        .bind(checkout.created_at)
        .execute(&mut *tx)
        .await?;

        let mut reservations = Vec::with_capacity(items.len());
        for item in items {
            let reservation = Reservation {
                reservation_id: Uuid::new_v4(),
                checkout_id: checkout.checkout_id,
                variant: item.variant,
                quantity: item.quantity,
                reserved_until: checkout.expires_at,
                status: ReservationStatus::Active,
            };
            sqlx::query(
                r#"
                INSERT INTO reservations_tb
                    (reservation_id, checkout_id, product_id, color_id, size_id,
                     quantity, reserved_until, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(reservation.reservation_id)
            .bind(reservation.checkout_id)
            .bind(reservation.variant.product_id)
            .bind(reservation.variant.color_id)
            .bind(reservation.variant.size_id)
            .bind(reservation.quantity)
            .bind(reservation.reserved_until)
            .bind(reservation.status.id())
            .execute(&mut *tx)
            .await?;
            reservations.push(reservation);
        }

        tx.commit().await?;

        tracing::info!(
            checkout_id = %checkout.checkout_id,
            user_id = user_id,
            items = items.len(),
            "Stock reserved"
        );

        Ok(CheckoutHold {
            checkout,
            reservations,
        })
    }

    async fn release(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        if !self.checkout_exists(checkout_id).await? {
            return Err(StockError::CheckoutNotFound(checkout_id));
        }

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE reservations_tb
            SET status = $1
            WHERE checkout_id = $2 AND status = $3
            RETURNING product_id, color_id, size_id, quantity
            "#,
        )
        .bind(ReservationStatus::Released.id())
        .bind(checkout_id)
        .bind(ReservationStatus::Active.id())
        .fetch_all(&mut *tx)
        .await?;

        for row in &rows {
            sqlx::query(
                r#"
                UPDATE variants_tb
                SET available = available + $1, updated_at = NOW()
                WHERE product_id = $2 AND color_id = $3 AND size_id = $4
                "#,
            )
            .bind(row.get::<i32, _>("quantity") as i64)
            .bind(row.get::<i64, _>("product_id"))
            .bind(row.get::<i32, _>("color_id"))
            .bind(row.get::<i32, _>("size_id"))
            .execute(&mut *tx)
            .await?;
        }

        if !rows.is_empty() {
            sqlx::query(
                r#"
                UPDATE checkouts_tb SET status = $1
                WHERE checkout_id = $2 AND status = $3
                "#,
            )
            .bind(CheckoutStatus::Cancelled.id())
            .bind(checkout_id)
            .bind(CheckoutStatus::Processing.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn consume(&self, checkout_id: CheckoutId) -> Result<u64, StockError> {
        if !self.checkout_exists(checkout_id).await? {
            return Err(StockError::CheckoutNotFound(checkout_id));
        }

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE reservations_tb
            SET status = $1
            WHERE checkout_id = $2 AND status = $3
            RETURNING product_id, color_id, size_id, quantity
            "#,
        )
        .bind(ReservationStatus::Consumed.id())
        .bind(checkout_id)
        .bind(ReservationStatus::Active.id())
        .fetch_all(&mut *tx)
        .await?;

        // Permanent decrement bookkeeping: the hold already removed the
        // quantity from `available`, consumption moves it into `sold`.
        for row in &rows {
            sqlx::query(
                r#"
                UPDATE variants_tb
                SET sold = sold + $1, updated_at = NOW()
                WHERE product_id = $2 AND color_id = $3 AND size_id = $4
                "#,
            )
            .bind(row.get::<i32, _>("quantity") as i64)
            .bind(row.get::<i64, _>("product_id"))
            .bind(row.get::<i32, _>("color_id"))
            .bind(row.get::<i32, _>("size_id"))
            .execute(&mut *tx)
            .await?;
        }

        if !rows.is_empty() {
            sqlx::query(
                r#"
                UPDATE checkouts_tb SET status = $1
                WHERE checkout_id = $2 AND status = $3
                "#,
            )
            .bind(CheckoutStatus::Completed.id())
            .bind(checkout_id)
            .bind(CheckoutStatus::Processing.id())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if !rows.is_empty() {
            tracing::info!(checkout_id = %checkout_id, count = rows.len(), "Reservations consumed");
        }
        Ok(rows.len() as u64)
    }

    async fn sweep_expired(&self) -> Result<u64, StockError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            r#"
            UPDATE reservations_tb
            SET status = $1
            WHERE status = $2 AND reserved_until < NOW()
            RETURNING checkout_id, product_id, color_id, size_id, quantity
            "#,
        )
        .bind(ReservationStatus::Expired.id())
        .bind(ReservationStatus::Active.id())
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            tx.commit().await?;
            return Ok(0);
        }

        let mut checkout_ids: Vec<Uuid> = Vec::new();
        for row in &rows {
            sqlx::query(
                r#"
                UPDATE variants_tb
                SET available = available + $1, updated_at = NOW()
                WHERE product_id = $2 AND color_id = $3 AND size_id = $4
                "#,
            )
            .bind(row.get::<i32, _>("quantity") as i64)
            .bind(row.get::<i64, _>("product_id"))
            .bind(row.get::<i32, _>("color_id"))
            .bind(row.get::<i32, _>("size_id"))
            .execute(&mut *tx)
            .await?;

            let checkout_id: Uuid = row.get("checkout_id");
            if !checkout_ids.contains(&checkout_id) {
                checkout_ids.push(checkout_id);
            }
        }

        sqlx::query(
            r#"
            UPDATE checkouts_tb SET status = $1
            WHERE checkout_id = ANY($2) AND status = $3
            "#,
        )
        .bind(CheckoutStatus::Expired.id())
        .bind(&checkout_ids)
        .bind(CheckoutStatus::Processing.id())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(count = rows.len(), "Expired reservations swept");
        Ok(rows.len() as u64)
    }

    async fn find_processing_checkout(
        &self,
        user_id: UserId,
    ) -> Result<Option<CheckoutHold>, StockError> {
        let row = sqlx::query(
            r#"
            SELECT checkout_id, user_id, status, expires_at, created_at
            FROM checkouts_tb
            WHERE user_id = $1 AND status = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(CheckoutStatus::Processing.id())
        .fetch_optional(&self.pool)
        .await?;

        let checkout = match row {
            Some(row) => Self::row_to_checkout(&row)?,
            None => return Ok(None),
        };
        let reservations = self.load_reservations(checkout.checkout_id).await?;
        Ok(Some(CheckoutHold {
            checkout,
            reservations,
        }))
    }

    async fn get_checkout(
        &self,
        checkout_id: CheckoutId,
    ) -> Result<Option<CheckoutHold>, StockError> {
        let row = sqlx::query(
            r#"
            SELECT checkout_id, user_id, status, expires_at, created_at
            FROM checkouts_tb
            WHERE checkout_id = $1
            "#,
        )
        .bind(checkout_id)
        .fetch_optional(&self.pool)
        .await?;

        let checkout = match row {
            Some(row) => Self::row_to_checkout(&row)?,
            None => return Ok(None),
        };
        let reservations = self.load_reservations(checkout_id).await?;
        Ok(Some(CheckoutHold {
            checkout,
            reservations,
        }))
    }

    async fn available(&self, variant: &VariantKey) -> Result<i64, StockError> {
        let row = sqlx::query(
            r#"
            SELECT available FROM variants_tb
            WHERE product_id = $1 AND color_id = $2 AND size_id = $3
            "#,
        )
        .bind(variant.product_id)
        .bind(variant.color_id)
        .bind(variant.size_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StockError::UnknownVariant(*variant))?;

        Ok(row.get("available"))
    }
}
