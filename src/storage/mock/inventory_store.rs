//! Mock InventoryStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{DateRange, Reservation, Room, RoomStatus};
use crate::storage::{InventoryStore, Result, StorageError};

#[derive(Default)]
struct InventoryState {
    rooms: HashMap<Uuid, Room>,
    reservations: HashMap<Uuid, Reservation>,
}

impl InventoryState {
    fn live_count(&self, room_id: Uuid) -> usize {
        self.reservations
            .values()
            .filter(|r| r.room_id == room_id && !r.released)
            .count()
    }

    fn room_mut(&mut self, room_id: Uuid) -> Result<&mut Room> {
        self.rooms
            .get_mut(&room_id)
            .ok_or_else(|| StorageError::not_found("room", room_id))
    }

    fn live_reservation(&self, reservation_id: Uuid) -> Result<Reservation> {
        let reservation = self
            .reservations
            .get(&reservation_id)
            .ok_or_else(|| StorageError::not_found("reservation", reservation_id))?;
        if reservation.released {
            return Err(StorageError::InvalidState(format!(
                "reservation {reservation_id} is released"
            )));
        }
        Ok(reservation.clone())
    }
}

/// In-memory room inventory.
#[derive(Default)]
pub struct MockInventoryStore {
    state: RwLock<InventoryState>,
    pending_conflicts: RwLock<u32>,
    fail_on_vacate: RwLock<bool>,
}

impl MockInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` reserve calls lose their compare-and-set.
    pub async fn inject_conflicts(&self, n: u32) {
        *self.pending_conflicts.write().await = n;
    }

    pub async fn set_fail_on_vacate(&self, fail: bool) {
        *self.fail_on_vacate.write().await = fail;
    }
}

#[async_trait]
impl InventoryStore for MockInventoryStore {
    async fn insert_room(&self, room: &Room) -> Result<()> {
        let mut state = self.state.write().await;
        if state.rooms.contains_key(&room.id) {
            return Err(StorageError::InvalidState(format!("room {} already exists", room.id)));
        }
        state.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>> {
        Ok(self.state.read().await.rooms.get(&room_id).cloned())
    }

    async fn reserve(&self, room_id: Uuid, range: DateRange) -> Result<Reservation> {
        let mut state = self.state.write().await;
        if !state.rooms.contains_key(&room_id) {
            return Err(StorageError::not_found("room", room_id));
        }

        {
            let mut pending = self.pending_conflicts.write().await;
            if *pending > 0 {
                *pending -= 1;
                return Err(StorageError::Conflict(format!("room {room_id} changed")));
            }
        }

        let status = state.rooms[&room_id].status;
        if !status.accepts_reservations() {
            return Err(StorageError::Unavailable(format!("room {room_id} is {status}")));
        }
        let overlapping = state
            .reservations
            .values()
            .any(|r| r.room_id == room_id && !r.released && r.range.overlaps(&range));
        if overlapping {
            return Err(StorageError::Unavailable(format!(
                "room {room_id} is already reserved for overlapping dates"
            )));
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            room_id,
            range,
            released: false,
            created_at: Utc::now(),
        };
        state.reservations.insert(reservation.id, reservation.clone());

        let live = state.live_count(room_id);
        let room = state.room_mut(room_id)?;
        room.status = RoomStatus::derive(room.status, room.current_occupancy, live);
        room.version += 1;

        Ok(reservation)
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>> {
        Ok(self.state.read().await.reservations.get(&reservation_id).cloned())
    }

    async fn live_reservations(&self, room_id: Uuid) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut live: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.room_id == room_id && !r.released)
            .cloned()
            .collect();
        live.sort_by_key(|r| r.range.check_in);
        Ok(live)
    }

    async fn release(&self, reservation_id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let room_id = match state.reservations.get_mut(&reservation_id) {
            Some(r) if r.released => return Ok(false),
            Some(r) => {
                r.released = true;
                r.room_id
            }
            None => return Err(StorageError::not_found("reservation", reservation_id)),
        };

        let live = state.live_count(room_id);
        let room = state.room_mut(room_id)?;
        room.status = RoomStatus::derive(room.status, room.current_occupancy, live);
        room.version += 1;
        Ok(true)
    }

    async fn occupy(&self, reservation_id: Uuid) -> Result<Room> {
        let mut state = self.state.write().await;
        let reservation = state.live_reservation(reservation_id)?;
        let room = state.room_mut(reservation.room_id)?;
        if room.status == RoomStatus::Maintenance {
            return Err(StorageError::Unavailable(format!("room {} is in maintenance", room.id)));
        }
        if room.current_occupancy >= room.capacity {
            return Err(StorageError::Unavailable(format!("room {} is at capacity", room.id)));
        }
        room.current_occupancy += 1;
        room.status = RoomStatus::Occupied;
        room.version += 1;
        Ok(room.clone())
    }

    async fn vacate(&self, reservation_id: Uuid) -> Result<Room> {
        if *self.fail_on_vacate.read().await {
            return Err(StorageError::Database("injected vacate failure".to_string()));
        }
        let mut state = self.state.write().await;
        let reservation = state.live_reservation(reservation_id)?;
        {
            let room = state.room_mut(reservation.room_id)?;
            if room.current_occupancy == 0 {
                return Err(StorageError::InvalidState(format!("room {} has no occupants", room.id)));
            }
            room.current_occupancy -= 1;
        }
        if let Some(r) = state.reservations.get_mut(&reservation_id) {
            r.released = true;
        }

        let live = state.live_count(reservation.room_id);
        let room = state.room_mut(reservation.room_id)?;
        let base = if room.status == RoomStatus::Maintenance {
            RoomStatus::Maintenance
        } else {
            RoomStatus::Available
        };
        room.status = RoomStatus::derive(base, room.current_occupancy, live);
        room.version += 1;
        Ok(room.clone())
    }

    async fn set_maintenance(&self, room_id: Uuid, on: bool) -> Result<Room> {
        let mut state = self.state.write().await;
        let live = state.live_count(room_id);
        let room = state.room_mut(room_id)?;
        room.status = if on {
            RoomStatus::Maintenance
        } else {
            RoomStatus::derive(RoomStatus::Available, room.current_occupancy, live)
        };
        room.version += 1;
        Ok(room.clone())
    }
}
