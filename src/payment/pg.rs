//! PostgreSQL settlement store
//!
//! `settle_payment_if` is the race arbiter: a conditional UPDATE on the
//! payment row plus the owning order row in one transaction. Exactly one
//! concurrent settler sees a rowcount of 1; everyone else loses and re-reads.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use super::error::PaymentError;
use super::models::{PaymentRecord, PaymentStatus};
use super::store::{PaymentRef, SettlementStore};
use crate::core_types::{OrderId, PaymentId, UserId};
use crate::order::{Order, OrderStatus};

pub struct PgSettlementStore {
    pool: PgPool,
}

impl PgSettlementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: &PgRow) -> Result<Order, PaymentError> {
        let status_id: i16 = row.get("status");
        let payment_status_id: i16 = row.get("payment_status");
        Ok(Order {
            order_id: row.get("order_id"),
            user_id: row.get("user_id"),
            checkout_id: row.get("checkout_id"),
            total_amount: row.get("total_amount"),
            status: OrderStatus::from_id(status_id).ok_or_else(|| {
                PaymentError::Database(format!("bad order status {status_id}"))
            })?,
            payment_status: PaymentStatus::from_id(payment_status_id).ok_or_else(|| {
                PaymentError::Database(format!("bad payment status {payment_status_id}"))
            })?,
            payment_method: row.get("payment_method"),
            shipping_address_id: row.get("shipping_address_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn row_to_payment(row: &PgRow) -> Result<PaymentRecord, PaymentError> {
        let status_id: i16 = row.get("status");
        Ok(PaymentRecord {
            payment_id: row.get("payment_id"),
            order_id: row.get("order_id"),
            gateway_order_id: row.get("gateway_order_id"),
            session_id: row.get("session_id"),
            amount: row.get("amount"),
            status: PaymentStatus::from_id(status_id).ok_or_else(|| {
                PaymentError::Database(format!("bad payment status {status_id}"))
            })?,
            gateway_response: row.get("gateway_response"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn find_payment_by_status(
        &self,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        let row = sqlx::query(
            r#"
            SELECT payment_id, order_id, gateway_order_id, session_id, amount,
                   status, gateway_response, created_at, updated_at
            FROM payments_tb
            WHERE order_id = $1 AND status = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .bind(status.id())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }
}

const SELECT_ORDER: &str = r#"
SELECT order_id, user_id, checkout_id, total_amount, status, payment_status,
       payment_method, shipping_address_id, created_at, updated_at
FROM orders_tb
"#;

#[async_trait]
impl SettlementStore for PgSettlementStore {
    async fn create_order(&self, order: &Order) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO orders_tb
                (order_id, user_id, checkout_id, total_amount, status,
                 payment_status, payment_method, shipping_address_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id)
        .bind(order.user_id)
        .bind(order.checkout_id)
        .bind(order.total_amount)
        .bind(order.status.id())
        .bind(order.payment_status.id())
        .bind(&order.payment_method)
        .bind(order.shipping_address_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, PaymentError> {
        let row = sqlx::query(&format!("{SELECT_ORDER} WHERE order_id = $1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn get_order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, PaymentError> {
        let row = sqlx::query(&format!(
            "{SELECT_ORDER} WHERE order_id = $1 AND user_id = $2"
        ))
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn create_payment(&self, payment: &PaymentRecord) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO payments_tb
                (payment_id, order_id, gateway_order_id, session_id, amount,
                 status, gateway_response, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.payment_id)
        .bind(payment.order_id)
        .bind(&payment.gateway_order_id)
        .bind(&payment.session_id)
        .bind(payment.amount)
        .bind(payment.status.id())
        .bind(&payment.gateway_response)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_open_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        self.find_payment_by_status(order_id, PaymentStatus::Unpaid)
            .await
    }

    async fn find_paid_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        self.find_payment_by_status(order_id, PaymentStatus::Paid)
            .await
    }

    async fn find_payment_for_user(
        &self,
        user_id: UserId,
        payment_ref: &PaymentRef,
    ) -> Result<Option<(PaymentRecord, Order)>, PaymentError> {
        let row = match payment_ref {
            PaymentRef::Order(order_id) => {
                sqlx::query(
                    r#"
                    SELECT payment_id, order_id, gateway_order_id, session_id,
                           amount, status, gateway_response, created_at, updated_at
                    FROM payments_tb
                    WHERE order_id = $1
                    ORDER BY created_at DESC
                    LIMIT 1
                    "#,
                )
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?
            }
            PaymentRef::GatewayOrder(gw_id) => {
                sqlx::query(
                    r#"
                    SELECT payment_id, order_id, gateway_order_id, session_id,
                           amount, status, gateway_response, created_at, updated_at
                    FROM payments_tb
                    WHERE gateway_order_id = $1
                    "#,
                )
                .bind(gw_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let payment = match row {
            Some(row) => Self::row_to_payment(&row)?,
            None => return Ok(None),
        };
        let order = match self.get_order_for_user(user_id, payment.order_id).await? {
            Some(order) => order,
            None => return Ok(None),
        };
        Ok(Some((payment, order)))
    }

    async fn settle_payment_if(
        &self,
        payment_id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
        snapshot: serde_json::Value,
        order_status: OrderStatus,
    ) -> Result<bool, PaymentError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE payments_tb
            SET status = $1, gateway_response = $2, updated_at = NOW()
            WHERE payment_id = $3 AND status = $4
            RETURNING order_id
            "#,
        )
        .bind(new_status.id())
        .bind(&snapshot)
        .bind(payment_id)
        .bind(expected.id())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // lost the CAS; nothing to commit
            return Ok(false);
        };
        let order_id: OrderId = row.get("order_id");

        sqlx::query(
            r#"
            UPDATE orders_tb
            SET payment_status = $1, status = $2, updated_at = NOW()
            WHERE order_id = $3
            "#,
        )
        .bind(new_status.id())
        .bind(order_status.id())
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            payment_id = %payment_id,
            order_id = %order_id,
            from = %expected,
            to = %new_status,
            "Payment settled"
        );
        Ok(true)
    }

    async fn refresh_snapshot(
        &self,
        payment_id: PaymentId,
        snapshot: serde_json::Value,
    ) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            UPDATE payments_tb
            SET gateway_response = $1, updated_at = NOW()
            WHERE payment_id = $2
            "#,
        )
        .bind(&snapshot)
        .bind(payment_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_order_method(&self, order_id: OrderId, method: &str) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            UPDATE orders_tb
            SET payment_method = $1, updated_at = NOW()
            WHERE order_id = $2
            "#,
        )
        .bind(method)
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_order_lifecycle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            UPDATE orders_tb
            SET status = $1, updated_at = NOW()
            WHERE order_id = $2
            "#,
        )
        .bind(status.id())
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    async fn create_test_pool() -> Option<PgPool> {
        let database_url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .ok()?;
        crate::db::schema::init_schema(&pool).await.ok()?;
        Some(pool)
    }

    fn sample_order() -> Order {
        Order::new(2001, Uuid::new_v4(), Decimal::new(99900, 2), None)
    }

    #[tokio::test]
    async fn test_order_payment_roundtrip() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };

        let store = PgSettlementStore::new(pool);
        let order = sample_order();
        store.create_order(&order).await.unwrap();

        let payment = PaymentRecord::new(
            order.order_id,
            format!("gw_{}", order.order_id.simple()),
            "session_x".to_string(),
            order.total_amount,
        );
        store.create_payment(&payment).await.unwrap();

        let open = store.find_open_payment(order.order_id).await.unwrap().unwrap();
        assert_eq!(open.payment_id, payment.payment_id);

        let (found, found_order) = store
            .find_payment_for_user(
                order.user_id,
                &PaymentRef::GatewayOrder(payment.gateway_order_id.clone()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.payment_id, payment.payment_id);
        assert_eq!(found_order.order_id, order.order_id);

        // wrong user never sees it
        assert!(
            store
                .find_payment_for_user(9999, &PaymentRef::Order(order.order_id))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_settle_cas_single_winner() {
        let pool = match create_test_pool().await {
            Some(p) => p,
            None => {
                eprintln!("Skipping test - database not available");
                return;
            }
        };

        let store = PgSettlementStore::new(pool);
        let order = sample_order();
        store.create_order(&order).await.unwrap();
        let payment = PaymentRecord::new(
            order.order_id,
            format!("gw_{}", order.order_id.simple()),
            "session_y".to_string(),
            order.total_amount,
        );
        store.create_payment(&payment).await.unwrap();

        let snapshot = serde_json::json!({"order_status": "PAID"});
        let first = store
            .settle_payment_if(
                payment.payment_id,
                PaymentStatus::Unpaid,
                PaymentStatus::Paid,
                snapshot.clone(),
                OrderStatus::Confirmed,
            )
            .await
            .unwrap();
        let second = store
            .settle_payment_if(
                payment.payment_id,
                PaymentStatus::Unpaid,
                PaymentStatus::Paid,
                snapshot,
                OrderStatus::Confirmed,
            )
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let order = store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
    }
}
