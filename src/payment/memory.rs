//! In-memory settlement store for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::PaymentError;
use super::models::{PaymentRecord, PaymentStatus};
use super::store::{PaymentRef, SettlementStore};
use crate::core_types::{OrderId, PaymentId, UserId};
use crate::order::{Order, OrderStatus};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, PaymentRecord>,
}

#[derive(Default)]
pub struct MemorySettlementStore {
    inner: Mutex<Inner>,
}

impl MemorySettlementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementStore for MemorySettlementStore {
    async fn create_order(&self, order: &Order) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        inner.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.orders.get(&order_id).cloned())
    }

    async fn get_order_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .orders
            .get(&order_id)
            .filter(|o| o.user_id == user_id)
            .cloned())
    }

    async fn create_payment(&self, payment: &PaymentRecord) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        inner.payments.insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn find_open_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payments
            .values()
            .filter(|p| p.order_id == order_id && p.status == PaymentStatus::Unpaid)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_paid_payment(
        &self,
        order_id: OrderId,
    ) -> Result<Option<PaymentRecord>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payments
            .values()
            .find(|p| p.order_id == order_id && p.status == PaymentStatus::Paid)
            .cloned())
    }

    async fn find_payment_for_user(
        &self,
        user_id: UserId,
        payment_ref: &PaymentRef,
    ) -> Result<Option<(PaymentRecord, Order)>, PaymentError> {
        let inner = self.inner.lock().unwrap();
        let payment = match payment_ref {
            PaymentRef::Order(order_id) => inner
                .payments
                .values()
                .filter(|p| p.order_id == *order_id)
                .max_by_key(|p| p.created_at)
                .cloned(),
            PaymentRef::GatewayOrder(gw_id) => inner
                .payments
                .values()
                .find(|p| p.gateway_order_id == *gw_id)
                .cloned(),
        };
        let Some(payment) = payment else {
            return Ok(None);
        };
        let Some(order) = inner.orders.get(&payment.order_id) else {
            return Ok(None);
        };
        if order.user_id != user_id {
            return Ok(None);
        }
        Ok(Some((payment, order.clone())))
    }

    async fn settle_payment_if(
        &self,
        payment_id: PaymentId,
        expected: PaymentStatus,
        new_status: PaymentStatus,
        snapshot: serde_json::Value,
        order_status: OrderStatus,
    ) -> Result<bool, PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(payment) = inner.payments.get_mut(&payment_id) else {
            return Ok(false);
        };
        if payment.status != expected {
            return Ok(false);
        }
        payment.status = new_status;
        payment.gateway_response = snapshot;
        payment.updated_at = Utc::now();
        let order_id = payment.order_id;

        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.payment_status = new_status;
            order.status = order_status;
            order.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn refresh_snapshot(
        &self,
        payment_id: PaymentId,
        snapshot: serde_json::Value,
    ) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(payment) = inner.payments.get_mut(&payment_id) {
            payment.gateway_response = snapshot;
            payment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_order_method(&self, order_id: OrderId, method: &str) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.payment_method = Some(method.to_string());
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_order_lifecycle(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), PaymentError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(order) = inner.orders.get_mut(&order_id) {
            order.status = status;
            order.updated_at = Utc::now();
        }
        Ok(())
    }
}
