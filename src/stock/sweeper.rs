//! Expiry sweep worker
//!
//! Background loop that reclaims stock from expired reservations. The TTL is
//! the system's cancellation mechanism for abandoned checkouts; this worker is
//! the enforcement. Sweep failures are logged and retried on the next pass,
//! never propagated into request handling.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::manager::ReservationManager;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// How often the sweep runs
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

pub struct SweepWorker {
    manager: Arc<ReservationManager>,
    config: SweeperConfig,
}

impl SweepWorker {
    pub fn new(manager: Arc<ReservationManager>, config: SweeperConfig) -> Self {
        Self { manager, config }
    }

    pub fn with_defaults(manager: Arc<ReservationManager>) -> Self {
        Self::new(manager, SweeperConfig::default())
    }

    /// Run the sweep loop forever.
    pub async fn run(&self) -> ! {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting reservation sweep worker"
        );

        loop {
            match self.manager.cleanup_expired().await {
                Ok(0) => debug!("No expired reservations"),
                Ok(count) => info!(count = count, "Swept expired reservations"),
                Err(e) => error!(error = %e, "Reservation sweep failed"),
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}
