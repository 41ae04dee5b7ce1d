//! Threadline engine entry point
//!
//! Wires the stock ledger, settlement store, payment gateway, and HTTP
//! surface from config, spawns the reservation sweep worker, and serves.

use std::sync::Arc;
use std::time::Duration;

use threadline::api::{self, AppState};
use threadline::cache::TtlCache;
use threadline::checkout::CheckoutOrchestrator;
use threadline::config::AppConfig;
use threadline::db::{Database, schema};
use threadline::payment::{
    HttpPaymentGateway, MemorySettlementStore, MockPaymentGateway, NoopFulfillment, PaymentGateway,
    PgSettlementStore, ReconciliationService, RetryPolicy, SettlementStore,
};
use threadline::shipment::ShipmentTracker;
use threadline::stock::{
    MemoryStockLedger, PgStockLedger, ReservationManager, StockLedger, SweepWorker, SweeperConfig,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = threadline::logging::init_logging(&config);

    tracing::info!(env = %env, version = env!("GIT_HASH"), "Starting threadline engine");

    let (ledger, store, db): (
        Arc<dyn StockLedger>,
        Arc<dyn SettlementStore>,
        Option<Arc<Database>>,
    ) = if config.postgres_url == "memory" {
        tracing::warn!("Running on in-memory backends; state will not survive a restart");
        (
            Arc::new(MemoryStockLedger::new()),
            Arc::new(MemorySettlementStore::new()),
            None,
        )
    } else {
        let db = Arc::new(Database::connect(&config.postgres_url).await?);
        schema::init_schema(db.pool()).await?;
        (
            Arc::new(PgStockLedger::new(db.pool().clone())),
            Arc::new(PgSettlementStore::new(db.pool().clone())),
            Some(db),
        )
    };

    let ttl = Duration::from_secs(config.reservation.ttl_minutes * 60);
    let manager = Arc::new(ReservationManager::new(ledger, ttl));

    let gateway: Arc<dyn PaymentGateway> = if config.payment.mock {
        tracing::warn!("Using the mock payment gateway; no real money moves");
        Arc::new(MockPaymentGateway::new())
    } else {
        let status_cache = Arc::new(TtlCache::new(Duration::from_secs(
            config.payment.status_cache_secs,
        )));
        Arc::new(HttpPaymentGateway::new(
            config.payment.base_url.clone(),
            config.payment.api_key.clone(),
            config.payment.api_secret.clone(),
            Duration::from_secs(config.payment.request_timeout_secs),
            status_cache,
        )?)
    };

    let retry = RetryPolicy::new(
        config.payment.retry_max_attempts,
        Duration::from_millis(config.payment.retry_base_delay_ms),
        Duration::from_millis(config.payment.retry_max_delay_ms),
    );

    let reconciliation = Arc::new(ReconciliationService::new(
        store.clone(),
        gateway,
        manager.clone(),
        Arc::new(NoopFulfillment),
        retry,
        config.payment.currency.clone(),
        config.payment.return_url.clone(),
    ));
    let orchestrator = Arc::new(CheckoutOrchestrator::new(
        manager.clone(),
        store.clone(),
        reconciliation.clone(),
    ));
    let tracker = Arc::new(ShipmentTracker::new(store, reconciliation.clone()));

    let sweeper = SweepWorker::new(
        manager,
        SweeperConfig {
            interval: Duration::from_secs(config.reservation.sweep_interval_secs),
        },
    );
    tokio::spawn(async move { sweeper.run().await });

    let state = Arc::new(AppState::new(orchestrator, reconciliation, tracker, db));
    let router = api::build_router(state);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP gateway listening");
    axum::serve(listener, router).await?;

    Ok(())
}
