use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Verified,
    Failed,
}

text_enum!(OrderStatus {
    Created => "created",
    Verified => "verified",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Gateway,
    Wallet,
}

text_enum!(PaymentMethod {
    Gateway => "gateway",
    Wallet => "wallet",
});

/// One payment attempt for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub amount: Amount,
    pub currency: String,
    pub method: PaymentMethod,
    /// Unset until the gateway acknowledges the order.
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrder {
    pub fn new(booking_id: Uuid, amount: Amount, currency: &str, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            amount,
            currency: currency.to_string(),
            method,
            gateway_order_id: None,
            gateway_payment_id: None,
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}
