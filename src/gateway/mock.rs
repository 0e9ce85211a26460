//! In-memory gateway for tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CreateOrderRequest, GatewayError, GatewayOrder, GatewayPayment, PaymentGateway};

#[derive(Default)]
struct MockState {
    orders: HashMap<String, GatewayOrder>,
    payments: HashMap<String, Vec<GatewayPayment>>,
    fail_next: Option<GatewayError>,
    /// Create the order but still report a timeout.
    lose_next_response: bool,
    create_calls: u32,
}

/// Gateway double that records orders and lets tests script failures.
#[derive(Default)]
pub struct MockGateway {
    state: RwLock<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next call with `err`.
    pub async fn fail_next(&self, err: GatewayError) {
        self.state.write().await.fail_next = Some(err);
    }

    /// Create the next order but answer with a timeout.
    pub async fn lose_next_response(&self) {
        self.state.write().await.lose_next_response = true;
    }

    /// Mark an order paid with a captured payment.
    pub async fn capture(&self, gateway_order_id: &str, payment_id: &str) {
        let mut state = self.state.write().await;
        if let Some(order) = state.orders.get_mut(gateway_order_id) {
            order.status = "paid".to_string();
        }
        state
            .payments
            .entry(gateway_order_id.to_string())
            .or_default()
            .push(GatewayPayment {
                id: payment_id.to_string(),
                status: "captured".to_string(),
            });
    }

    pub async fn create_calls(&self) -> u32 {
        self.state.read().await.create_calls
    }

    async fn take_failure(&self) -> Result<(), GatewayError> {
        match self.state.write().await.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.take_failure().await?;
        let mut state = self.state.write().await;
        state.create_calls += 1;

        let order = GatewayOrder {
            id: format!("order_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            receipt: Some(request.receipt.clone()),
            status: "created".to_string(),
        };
        state.orders.insert(order.id.clone(), order.clone());

        if std::mem::take(&mut state.lose_next_response) {
            return Err(GatewayError::Timeout("response lost".to_string()));
        }
        Ok(order)
    }

    async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<GatewayOrder>, GatewayError> {
        self.take_failure().await?;
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| o.receipt.as_deref() == Some(receipt))
            .cloned())
    }

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError> {
        self.take_failure().await?;
        self.state
            .read()
            .await
            .orders
            .get(gateway_order_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected(format!("unknown order {gateway_order_id}")))
    }

    async fn fetch_payments(&self, gateway_order_id: &str) -> Result<Vec<GatewayPayment>, GatewayError> {
        self.take_failure().await?;
        Ok(self
            .state
            .read()
            .await
            .payments
            .get(gateway_order_id)
            .cloned()
            .unwrap_or_default())
    }
}
