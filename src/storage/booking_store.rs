//! BookingStore trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use super::Result;
use crate::model::{Booking, BookingStatus, PromoCode};

/// Fields written by a status transition. `None` leaves a column unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingUpdate {
    pub status: BookingStatus,
    pub confirmed_order_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
}

impl BookingUpdate {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status,
            confirmed_order_id: None,
            cancellation_reason: None,
        }
    }
}

/// Interface for booking persistence.
///
/// Implementations:
/// - `SqliteBookingStore`: SQLite storage
/// - `MockBookingStore`: In-memory mock for testing
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>>;

    /// Bookings held by a profile, newest first.
    async fn list_bookings_for_holder(&self, holder_id: Uuid, limit: u32) -> Result<Vec<Booking>>;

    /// Compare-and-set on status.
    ///
    /// Applies `update` only if the current status is one of `from`. Returns
    /// the updated booking, or `None` if the status did not match (or the
    /// booking does not exist).
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        update: BookingUpdate,
    ) -> Result<Option<Booking>>;

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()>;

    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>>;
}
