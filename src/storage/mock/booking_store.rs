//! Mock BookingStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Booking, BookingStatus, PromoCode};
use crate::storage::{BookingStore, BookingUpdate, Result, StorageError};

/// In-memory bookings and promo codes.
#[derive(Default)]
pub struct MockBookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
    promos: RwLock<HashMap<String, PromoCode>>,
    fail_on_insert: RwLock<bool>,
}

impl MockBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }
}

#[async_trait]
impl BookingStore for MockBookingStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        if *self.fail_on_insert.read().await {
            return Err(StorageError::Database("injected insert failure".to_string()));
        }
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(StorageError::InvalidState(format!("booking {} already exists", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn list_bookings_for_holder(&self, holder_id: Uuid, limit: u32) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut owned: Vec<Booking> = bookings
            .values()
            .filter(|b| b.holder_id == holder_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned.truncate(limit as usize);
        Ok(owned)
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        update: BookingUpdate,
    ) -> Result<Option<Booking>> {
        let mut bookings = self.bookings.write().await;
        let Some(booking) = bookings.get_mut(&booking_id) else {
            return Ok(None);
        };
        if !from.contains(&booking.status) {
            return Ok(None);
        }
        booking.status = update.status;
        if let Some(order_id) = update.confirmed_order_id {
            booking.confirmed_order_id = Some(order_id);
        }
        if let Some(reason) = update.cancellation_reason {
            booking.cancellation_reason = Some(reason);
        }
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn insert_promo(&self, promo: &PromoCode) -> Result<()> {
        self.promos
            .write()
            .await
            .insert(promo.code.clone(), promo.clone());
        Ok(())
    }

    async fn get_promo(&self, code: &str) -> Result<Option<PromoCode>> {
        Ok(self.promos.read().await.get(code).cloned())
    }
}
