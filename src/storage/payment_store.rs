//! PaymentStore trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use super::Result;
use crate::model::PaymentOrder;

/// Result of `PaymentStore::mark_verified`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkVerified {
    /// This call moved the order from `created` to `verified`.
    Verified(PaymentOrder),
    /// The order was already verified earlier.
    AlreadyVerified(PaymentOrder),
    /// The order is `failed` and can no longer be verified.
    NotOpen(PaymentOrder),
    /// A different order of the same booking is already verified.
    BookingAlreadyPaid(PaymentOrder),
}

/// Interface for payment order persistence.
///
/// Implementations:
/// - `SqlitePaymentStore`: SQLite storage
/// - `MockPaymentStore`: In-memory mock for testing
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_order(&self, order: &PaymentOrder) -> Result<()>;

    async fn get_order(&self, order_id: Uuid) -> Result<Option<PaymentOrder>>;

    async fn find_order_by_gateway_id(&self, gateway_order_id: &str) -> Result<Option<PaymentOrder>>;

    /// All attempts for a booking, oldest first.
    async fn list_orders_for_booking(&self, booking_id: Uuid) -> Result<Vec<PaymentOrder>>;

    /// Record the gateway's order id. Only applies once, while `created`.
    async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> Result<bool>;

    /// Compare-and-set `created -> verified`, refusing a second verified
    /// order for the same booking.
    async fn mark_verified(&self, order_id: Uuid, payment_id: &str) -> Result<MarkVerified>;

    /// Compare-and-set `created -> failed`. Returns `false` if not `created`.
    async fn mark_failed(&self, order_id: Uuid) -> Result<bool>;

    async fn verified_order_for_booking(&self, booking_id: Uuid) -> Result<Option<PaymentOrder>>;
}
