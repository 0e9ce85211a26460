//! InventoryStore interface tests.

use std::sync::Arc;

use uuid::Uuid;

use roomledger::model::RoomStatus;
use roomledger::storage::{StorageError, Stores};

use super::{range, seed_room};

// =============================================================================
// Rooms
// =============================================================================

pub async fn test_get_missing_room(stores: &Stores) {
    let room = stores.inventory.get_room(Uuid::new_v4()).await.unwrap();
    assert!(room.is_none(), "unknown room should be None");
}

pub async fn test_insert_and_get_room(stores: &Stores) {
    let room = seed_room(stores, 3).await;
    let loaded = stores.inventory.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(loaded, room);
}

// =============================================================================
// Reservations
// =============================================================================

pub async fn test_reserve_marks_room_reserved(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    let reservation = stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap();
    assert_eq!(reservation.room_id, room.id);
    assert!(!reservation.released);

    let loaded = stores.inventory.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RoomStatus::Reserved);
    assert!(loaded.version > room.version, "reserve should bump version");
}

pub async fn test_overlapping_reserve_rejected(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap();

    let err = stores
        .inventory
        .reserve(room.id, range("2026-08-15", "2026-10-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)), "got {err:?}");
}

pub async fn test_back_to_back_reserve_allowed(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap();
    stores
        .inventory
        .reserve(room.id, range("2026-09-01", "2026-10-01"))
        .await
        .expect("check-out day may be the next check-in");

    let live = stores.inventory.live_reservations(room.id).await.unwrap();
    assert_eq!(live.len(), 2);
    assert!(live[0].range.check_in < live[1].range.check_in, "ordered by check-in");
}

pub async fn test_reserve_unknown_room(stores: &Stores) {
    let err = stores
        .inventory
        .reserve(Uuid::new_v4(), range("2026-08-01", "2026-09-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }), "got {err:?}");
}

pub async fn test_release_is_idempotent(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    let stay = range("2026-08-01", "2026-09-01");
    let reservation = stores.inventory.reserve(room.id, stay).await.unwrap();

    assert!(stores.inventory.release(reservation.id).await.unwrap());
    assert!(!stores.inventory.release(reservation.id).await.unwrap());

    let loaded = stores.inventory.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, RoomStatus::Available);

    stores
        .inventory
        .reserve(room.id, stay)
        .await
        .expect("released dates can be reserved again");
}

pub async fn test_maintenance_blocks_reserve(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    let room = stores.inventory.set_maintenance(room.id, true).await.unwrap();
    assert_eq!(room.status, RoomStatus::Maintenance);

    let err = stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)), "got {err:?}");

    let room = stores.inventory.set_maintenance(room.id, false).await.unwrap();
    assert_eq!(room.status, RoomStatus::Available);
}

// =============================================================================
// Occupancy
// =============================================================================

pub async fn test_occupy_and_vacate(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    let reservation = stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap();

    let occupied = stores.inventory.occupy(reservation.id).await.unwrap();
    assert_eq!(occupied.current_occupancy, 1);
    assert_eq!(occupied.status, RoomStatus::Occupied);

    let vacated = stores.inventory.vacate(reservation.id).await.unwrap();
    assert_eq!(vacated.current_occupancy, 0);
    assert_eq!(vacated.status, RoomStatus::Available);

    let reservation = stores
        .inventory
        .get_reservation(reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert!(reservation.released, "vacate releases the hold");
}

pub async fn test_occupy_respects_capacity(stores: &Stores) {
    let room = seed_room(stores, 1).await;
    let first = stores
        .inventory
        .reserve(room.id, range("2026-08-01", "2026-09-01"))
        .await
        .unwrap();
    let second = stores
        .inventory
        .reserve(room.id, range("2026-09-01", "2026-10-01"))
        .await
        .unwrap();

    stores.inventory.occupy(first.id).await.unwrap();
    let err = stores.inventory.occupy(second.id).await.unwrap_err();
    assert!(matches!(err, StorageError::Unavailable(_)), "got {err:?}");

    let loaded = stores.inventory.get_room(room.id).await.unwrap().unwrap();
    assert_eq!(loaded.current_occupancy, 1);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Many concurrent holds on the same dates: exactly one wins.
pub async fn test_concurrent_reserve_single_winner(stores: &Stores) {
    let room_id = seed_room(stores, 1).await.id;
    let inventory = Arc::clone(&stores.inventory);

    let attempts = (0..8).map(|_| {
        let inventory = Arc::clone(&inventory);
        tokio::spawn(async move {
            inventory
                .reserve(room_id, range("2026-08-01", "2026-09-01"))
                .await
        })
    });
    let results = futures::future::join_all(attempts).await;

    let mut won = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => won += 1,
            Err(StorageError::Unavailable(_)) | Err(StorageError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(won, 1, "exactly one reservation should win");
    assert_eq!(stores.inventory.live_reservations(room_id).await.unwrap().len(), 1);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all InventoryStore interface tests against a `Stores`.
#[macro_export]
macro_rules! run_inventory_store_tests {
    ($stores:expr) => {
        use $crate::storage::inventory_store_tests::*;

        test_get_missing_room($stores).await;
        println!("  test_get_missing_room: PASSED");

        test_insert_and_get_room($stores).await;
        println!("  test_insert_and_get_room: PASSED");

        test_reserve_marks_room_reserved($stores).await;
        println!("  test_reserve_marks_room_reserved: PASSED");

        test_overlapping_reserve_rejected($stores).await;
        println!("  test_overlapping_reserve_rejected: PASSED");

        test_back_to_back_reserve_allowed($stores).await;
        println!("  test_back_to_back_reserve_allowed: PASSED");

        test_reserve_unknown_room($stores).await;
        println!("  test_reserve_unknown_room: PASSED");

        test_release_is_idempotent($stores).await;
        println!("  test_release_is_idempotent: PASSED");

        test_maintenance_blocks_reserve($stores).await;
        println!("  test_maintenance_blocks_reserve: PASSED");

        test_occupy_and_vacate($stores).await;
        println!("  test_occupy_and_vacate: PASSED");

        test_occupy_respects_capacity($stores).await;
        println!("  test_occupy_respects_capacity: PASSED");

        test_concurrent_reserve_single_winner($stores).await;
        println!("  test_concurrent_reserve_single_winner: PASSED");
    };
}
