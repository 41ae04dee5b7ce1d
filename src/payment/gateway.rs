//! Payment gateway adapter
//!
//! Creates hosted payment sessions and fetches authoritative order status.
//! Gateway-specific status strings are normalized into the internal
//! `PaymentStatus` vocabulary; anything unrecognized is treated as
//! still-pending, never as paid.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

use super::models::PaymentStatus;
use crate::cache::TtlCache;
use crate::core_types::{OrderId, UserId};

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway request timed out")]
    Timeout,

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// What the gateway needs to open a payment session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub currency: String,
    pub return_url: String,
    /// Restrict payment methods on the hosted page (e.g. "upi", "card")
    pub method_filter: Option<String>,
}

/// Handles returned by session creation
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySession {
    pub session_id: String,
    pub gateway_order_id: String,
}

/// The gateway's view of an order: its status vocabulary plus the raw payload
/// we persist as an opaque snapshot.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub status: String,
    pub raw: serde_json::Value,
}

/// Map the gateway's status vocabulary onto the internal payment states.
///
/// Unknown strings resolve to UNPAID: still-pending is the only safe reading
/// of vocabulary we do not recognize.
pub fn normalize_status(raw: &str) -> PaymentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "PAID" | "SUCCESS" | "CHARGED" => PaymentStatus::Paid,
        "FAILED" | "FAILURE" | "CANCELLED" | "TERMINATED" | "TERMINATION_REQUESTED" => {
            PaymentStatus::Failed
        }
        "USER_DROPPED" | "DROPPED" | "EXPIRED" => PaymentStatus::Dropped,
        // ACTIVE, PENDING, NOT_ATTEMPTED, and anything unknown
        _ => PaymentStatus::Unpaid,
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Create a payment session with the external gateway.
    async fn create_session(&self, req: &SessionRequest) -> Result<GatewaySession, GatewayError>;

    /// Fetch the gateway's authoritative view of an order.
    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError>;
}

// ============================================================================
// HTTP client
// ============================================================================

/// REST gateway client with a hard per-request timeout.
///
/// The injected cache coalesces `fetch_order` calls for a few seconds so
/// read-only verification polls do not hammer the provider. Staleness can only
/// err toward "still unpaid", which is the safe direction.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    status_cache: Arc<TtlCache<String, GatewayOrder>>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: String,
        api_key: String,
        api_secret: String,
        request_timeout: Duration,
        status_cache: Arc<TtlCache<String, GatewayOrder>>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            api_secret,
            status_cache,
        })
    }

    fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn create_session(&self, req: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        let body = json!({
            "order_id": req.order_id,
            "order_amount": req.amount,
            "order_currency": req.currency,
            "customer": { "customer_id": req.user_id.to_string() },
            "order_meta": {
                "return_url": req.return_url,
                "payment_methods": req.method_filter,
            },
        });

        let resp = self
            .client
            .post(format!("{}/orders", self.base_url))
            .header("x-client-id", &self.api_key)
            .header("x-client-secret", &self.api_secret)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {text}")));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let session_id = payload
            .get("payment_session_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse("missing payment_session_id".into()))?;
        let gateway_order_id = payload
            .get("order_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse("missing order_id".into()))?;

        Ok(GatewaySession {
            session_id: session_id.to_string(),
            gateway_order_id: gateway_order_id.to_string(),
        })
    }

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        let key = gateway_order_id.to_string();
        if let Some(cached) = self.status_cache.get(&key) {
            return Ok(cached);
        }

        let resp = self
            .client
            .get(format!("{}/orders/{}", self.base_url, gateway_order_id))
            .header("x-client-id", &self.api_key)
            .header("x-client-secret", &self.api_secret)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {text}")));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let status = payload
            .get("order_status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::InvalidResponse("missing order_status".into()))?
            .to_string();

        let order = GatewayOrder {
            status,
            raw: payload,
        };
        self.status_cache.insert(key, order.clone());
        Ok(order)
    }
}

// ============================================================================
// Mock gateway
// ============================================================================

/// Scriptable in-process gateway for tests and local development.
pub struct MockPaymentGateway {
    /// Status the next fetch reports per gateway order id
    statuses: Mutex<HashMap<String, String>>,
    fail_create: Mutex<bool>,
    fail_fetch: Mutex<bool>,
    create_count: AtomicUsize,
    fetch_count: AtomicUsize,
    seq: AtomicUsize,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            fail_create: Mutex::new(false),
            fail_fetch: Mutex::new(false),
            create_count: AtomicUsize::new(0),
            fetch_count: AtomicUsize::new(0),
            seq: AtomicUsize::new(0),
        }
    }

    /// Script what the gateway reports for an order.
    pub fn set_order_status(&self, gateway_order_id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(gateway_order_id.to_string(), status.to_string());
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    pub fn create_count(&self) -> usize {
        self.create_count.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_session(&self, req: &SessionRequest) -> Result<GatewaySession, GatewayError> {
        self.create_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create.lock().unwrap() {
            return Err(GatewayError::Network("mock create failure".into()));
        }

        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let gateway_order_id = format!("gw_order_{}_{}", req.order_id.simple(), n);
        self.statuses
            .lock()
            .unwrap()
            .insert(gateway_order_id.clone(), "ACTIVE".to_string());

        Ok(GatewaySession {
            session_id: format!("session_{n}"),
            gateway_order_id,
        })
    }

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fetch.lock().unwrap() {
            return Err(GatewayError::Timeout);
        }

        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("unknown order {gateway_order_id}")))?;

        let raw = json!({ "order_id": gateway_order_id, "order_status": status.clone() });
        Ok(GatewayOrder { status, raw })
    }
}
