//! Inventory ledger: room holds for date ranges.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::model::{DateRange, Reservation, Room};
use crate::storage::{InventoryStore, StorageError};
use crate::utils::retry::{conflict_backoff, is_retryable_storage};

fn log_conflict(err: &StorageError, delay: Duration) {
    debug!(error = %err, delay = ?delay, "inventory compare-and-set lost, re-evaluating");
}

/// Grants and releases exclusive holds on rooms.
///
/// Every mutation is a compare-and-set on the room version. A lost race is
/// re-evaluated from fresh state; an overlap found on re-evaluation is
/// reported as `RoomUnavailable` and never retried.
pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Onboard a room.
    pub async fn register_room(&self, room: Room) -> Result<Room> {
        if room.capacity == 0 {
            return Err(ServiceError::validation("capacity must be positive"));
        }
        if room.monthly_rent < 0 {
            return Err(ServiceError::validation("monthly rent cannot be negative"));
        }
        if room.current_occupancy > room.capacity {
            return Err(ServiceError::validation("occupancy exceeds capacity"));
        }
        self.store.insert_room(&room).await?;
        info!(room_id = %room.id, property_id = %room.property_id, "room registered");
        Ok(room)
    }

    pub async fn get_room(&self, room_id: Uuid) -> Result<Room> {
        self.store
            .get_room(room_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("room"))
    }

    pub async fn get_reservation(&self, reservation_id: Uuid) -> Result<Reservation> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("reservation"))
    }

    pub async fn live_reservations(&self, room_id: Uuid) -> Result<Vec<Reservation>> {
        Ok(self.store.live_reservations(room_id).await?)
    }

    pub async fn reserve(&self, room_id: Uuid, range: DateRange) -> Result<Reservation> {
        let reservation = (|| async { self.store.reserve(room_id, range).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(log_conflict)
            .await?;

        info!(
            room_id = %room_id,
            reservation_id = %reservation.id,
            check_in = %range.check_in,
            check_out = %range.check_out,
            "room reserved"
        );
        Ok(reservation)
    }

    /// Idempotent: releasing an already released hold returns `false`.
    pub async fn release(&self, reservation_id: Uuid) -> Result<bool> {
        let released = (|| async { self.store.release(reservation_id).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(log_conflict)
            .await?;

        if released {
            info!(reservation_id = %reservation_id, "reservation released");
        }
        Ok(released)
    }

    /// Check-in against a live hold.
    pub async fn occupy(&self, reservation_id: Uuid) -> Result<Room> {
        let room = (|| async { self.store.occupy(reservation_id).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(log_conflict)
            .await?;
        info!(room_id = %room.id, occupancy = room.current_occupancy, "room occupied");
        Ok(room)
    }

    /// Check-out; releases the hold.
    pub async fn vacate(&self, reservation_id: Uuid) -> Result<Room> {
        let room = (|| async { self.store.vacate(reservation_id).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(log_conflict)
            .await?;
        info!(room_id = %room.id, occupancy = room.current_occupancy, "room vacated");
        Ok(room)
    }

    pub async fn set_maintenance(&self, room_id: Uuid, on: bool) -> Result<Room> {
        let room = (|| async { self.store.set_maintenance(room_id, on).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(log_conflict)
            .await?;
        info!(room_id = %room.id, status = %room.status, "room maintenance updated");
        Ok(room)
    }
}
