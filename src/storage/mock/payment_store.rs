//! Mock PaymentStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{OrderStatus, PaymentOrder};
use crate::storage::{MarkVerified, PaymentStore, Result, StorageError};

/// In-memory payment orders.
#[derive(Default)]
pub struct MockPaymentStore {
    orders: RwLock<HashMap<Uuid, PaymentOrder>>,
}

impl MockPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MockPaymentStore {
    async fn insert_order(&self, order: &PaymentOrder) -> Result<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StorageError::InvalidState(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn find_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<PaymentOrder>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.gateway_order_id.as_deref() == Some(gateway_order_id))
            .cloned())
    }

    async fn list_orders_for_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentOrder>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<PaymentOrder> = orders
            .values()
            .filter(|o| o.booking_id == booking_id)
            .cloned()
            .collect();
        matching.sort_by_key(|o| o.created_at);
        Ok(matching)
    }

    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Created && order.gateway_order_id.is_none() => {
                order.gateway_order_id = Some(gateway_order_id.to_string());
                order.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StorageError::not_found("payment order", order_id)),
        }
    }

    async fn mark_verified(&self, order_id: Uuid, payment_id: &str) -> Result<MarkVerified> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("payment order", order_id))?;

        match order.status {
            OrderStatus::Verified => return Ok(MarkVerified::AlreadyVerified(order)),
            OrderStatus::Failed => return Ok(MarkVerified::NotOpen(order)),
            OrderStatus::Created => {}
        }

        let other_verified = orders
            .values()
            .find(|o| o.booking_id == order.booking_id && o.status == OrderStatus::Verified)
            .cloned();
        if let Some(other) = other_verified {
            return Ok(MarkVerified::BookingAlreadyPaid(other));
        }

        let entry = orders
            .get_mut(&order_id)
            .ok_or_else(|| StorageError::not_found("payment order", order_id))?;
        entry.status = OrderStatus::Verified;
        entry.gateway_payment_id = Some(payment_id.to_string());
        entry.updated_at = Utc::now();
        Ok(MarkVerified::Verified(entry.clone()))
    }

    async fn mark_failed(&self, order_id: Uuid) -> Result<bool> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order_id) {
            Some(order) if order.status == OrderStatus::Created => {
                order.status = OrderStatus::Failed;
                order.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StorageError::not_found("payment order", order_id)),
        }
    }

    async fn verified_order_for_booking(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.booking_id == booking_id && o.status == OrderStatus::Verified)
            .cloned())
    }
}
