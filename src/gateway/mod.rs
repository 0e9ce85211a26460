//! Payment gateway client.
//!
//! The gateway is an external collaborator reached over HTTP. Services talk
//! to it through the `PaymentGateway` trait so tests can substitute
//! `MockGateway`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::Amount;

mod http;
mod mock;
pub mod signature;

pub use self::http::HttpGateway;
pub use mock::MockGateway;

/// Errors from gateway calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// The gateway did not answer within the configured timeout.
    #[error("gateway timed out: {0}")]
    Timeout(String),

    /// Transport failure or 5xx.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway answered and refused the request.
    #[error("gateway rejected request: {0}")]
    Rejected(String),
}

/// Body of an order-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    /// Minor units.
    pub amount: Amount,
    pub currency: String,
    /// Our payment order id; lets a timed-out creation be found again.
    pub receipt: String,
}

/// Order as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub amount: Amount,
    #[serde(default)]
    pub receipt: Option<String>,
    /// `created`, `attempted` or `paid`.
    #[serde(default)]
    pub status: String,
}

impl GatewayOrder {
    pub fn is_paid(&self) -> bool {
        self.status == "paid"
    }
}

/// Payment attempt as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayPayment {
    pub id: String,
    /// `created`, `authorized`, `captured`, `refunded` or `failed`.
    pub status: String,
}

impl GatewayPayment {
    pub fn is_captured(&self) -> bool {
        self.status == "captured"
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an order. Never retried: a timeout may still have created it.
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<GatewayOrder, GatewayError>;

    /// Look an order up by our receipt.
    async fn find_order_by_receipt(&self, receipt: &str) -> Result<Option<GatewayOrder>, GatewayError>;

    async fn fetch_order(&self, gateway_order_id: &str) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_payments(&self, gateway_order_id: &str) -> Result<Vec<GatewayPayment>, GatewayError>;
}
