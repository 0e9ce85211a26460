//! InventoryStore trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use super::Result;
use crate::model::{DateRange, Reservation, Room};

/// Interface for room inventory persistence.
///
/// Every mutation bumps the room's `version`; `reserve` commits only if the
/// version it evaluated against is still current, which makes two
/// overlapping reservations for the same room mutually exclusive.
///
/// Implementations:
/// - `SqliteInventoryStore`: SQLite storage
/// - `MockInventoryStore`: In-memory mock for testing
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Register a room (property onboarding).
    async fn insert_room(&self, room: &Room) -> Result<()>;

    async fn get_room(&self, room_id: Uuid) -> Result<Option<Room>>;

    /// Place an exclusive hold on `room_id` for `range`.
    ///
    /// Errors:
    /// - `NotFound` when the room does not exist
    /// - `Unavailable` when a live reservation overlaps or the room is in maintenance
    /// - `Conflict` when another mutation committed first (re-evaluate and retry)
    async fn reserve(&self, room_id: Uuid, range: DateRange) -> Result<Reservation>;

    async fn get_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>>;

    /// Live (unreleased) reservations on a room, ordered by check-in.
    async fn live_reservations(&self, room_id: Uuid) -> Result<Vec<Reservation>>;

    /// Release a hold. Returns `false` if it was already released.
    async fn release(&self, reservation_id: Uuid) -> Result<bool>;

    /// Check the holder in: occupancy + 1, guarded by capacity.
    async fn occupy(&self, reservation_id: Uuid) -> Result<Room>;

    /// Check the holder out: occupancy - 1 and release the hold.
    async fn vacate(&self, reservation_id: Uuid) -> Result<Room>;

    /// Enter or leave maintenance. Existing reservations are kept.
    async fn set_maintenance(&self, room_id: Uuid, on: bool) -> Result<Room>;
}
