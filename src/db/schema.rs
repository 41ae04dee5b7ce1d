//! Schema bootstrap for the reservation and settlement tables
//!
//! All DDL is idempotent (`IF NOT EXISTS`) so it is safe to run at every
//! startup. Status columns are SMALLINT state ids, matching the enum ids in
//! `stock::models` / `payment::models` / `order`.

use anyhow::{Context, Result};
use sqlx::PgPool;

const CREATE_VARIANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS variants_tb (
    product_id  BIGINT      NOT NULL,
    color_id    INTEGER     NOT NULL,
    size_id     INTEGER     NOT NULL,
    available   BIGINT      NOT NULL DEFAULT 0 CHECK (available >= 0),
    sold        BIGINT      NOT NULL DEFAULT 0,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (product_id, color_id, size_id)
)
"#;

const CREATE_CHECKOUTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS checkouts_tb (
    checkout_id UUID        PRIMARY KEY,
    user_id     BIGINT      NOT NULL,
    status      SMALLINT    NOT NULL DEFAULT 0,
    expires_at  TIMESTAMPTZ NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_CHECKOUTS_USER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_checkouts_user_status
    ON checkouts_tb (user_id, status, created_at DESC)
"#;

const CREATE_RESERVATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reservations_tb (
    reservation_id UUID        PRIMARY KEY,
    checkout_id    UUID        NOT NULL REFERENCES checkouts_tb (checkout_id),
    product_id     BIGINT      NOT NULL,
    color_id       INTEGER     NOT NULL,
    size_id        INTEGER     NOT NULL,
    quantity       INTEGER     NOT NULL CHECK (quantity > 0),
    reserved_until TIMESTAMPTZ NOT NULL,
    status         SMALLINT    NOT NULL DEFAULT 0,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_RESERVATIONS_SWEEP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_reservations_sweep
    ON reservations_tb (status, reserved_until)
"#;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders_tb (
    order_id            UUID           PRIMARY KEY,
    user_id             BIGINT         NOT NULL,
    checkout_id         UUID           NOT NULL,
    total_amount        NUMERIC(14, 2) NOT NULL,
    status              SMALLINT       NOT NULL DEFAULT 0,
    payment_status      SMALLINT       NOT NULL DEFAULT 0,
    payment_method      TEXT,
    shipping_address_id BIGINT,
    created_at          TIMESTAMPTZ    NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ    NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PAYMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments_tb (
    payment_id       UUID           PRIMARY KEY,
    order_id         UUID           NOT NULL REFERENCES orders_tb (order_id),
    gateway_order_id TEXT           NOT NULL,
    session_id       TEXT           NOT NULL,
    amount           NUMERIC(14, 2) NOT NULL,
    status           SMALLINT       NOT NULL DEFAULT 0,
    gateway_response JSONB          NOT NULL DEFAULT '{}'::jsonb,
    created_at       TIMESTAMPTZ    NOT NULL DEFAULT NOW(),
    updated_at       TIMESTAMPTZ    NOT NULL DEFAULT NOW()
)
"#;

const CREATE_PAYMENTS_GATEWAY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_payments_gateway_order
    ON payments_tb (gateway_order_id)
"#;

/// Initialize the Postgres schema for the reservation/settlement engine
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing Postgres schema...");

    for (name, ddl) in [
        ("variants_tb", CREATE_VARIANTS_TABLE),
        ("checkouts_tb", CREATE_CHECKOUTS_TABLE),
        ("idx_checkouts_user_status", CREATE_CHECKOUTS_USER_INDEX),
        ("reservations_tb", CREATE_RESERVATIONS_TABLE),
        ("idx_reservations_sweep", CREATE_RESERVATIONS_SWEEP_INDEX),
        ("orders_tb", CREATE_ORDERS_TABLE),
        ("payments_tb", CREATE_PAYMENTS_TABLE),
        ("idx_payments_gateway_order", CREATE_PAYMENTS_GATEWAY_INDEX),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {}", name))?;
    }

    tracing::info!("Postgres schema ready");
    Ok(())
}
