//! Shared storage integration tests.
//!
//! Tests the store traits against all implementations. Each backend module
//! builds a `Stores` and runs these suites through the runner macros.
//! Every test creates its own rooms and profiles, so suites can share a
//! database.

#![allow(dead_code)]

pub mod booking_store_tests;
pub mod inventory_store_tests;
pub mod misc_store_tests;
pub mod payment_store_tests;
pub mod wallet_store_tests;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use roomledger::model::{Booking, BookingStatus, DateRange, Room};
use roomledger::storage::Stores;

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date")
}

pub fn range(check_in: &str, check_out: &str) -> DateRange {
    DateRange::new(date(check_in), date(check_out)).expect("valid range")
}

/// Insert a fresh room with the given capacity.
pub async fn seed_room(stores: &Stores, capacity: u32) -> Room {
    let room = Room::new(Uuid::new_v4(), capacity, 1_000_000);
    stores
        .inventory
        .insert_room(&room)
        .await
        .expect("insert_room should succeed");
    room
}

/// Insert a pending booking backed by a real reservation.
pub async fn seed_booking(stores: &Stores, holder_id: Uuid) -> Booking {
    let room = seed_room(stores, 1).await;
    let stay = range("2026-08-01", "2026-09-01");
    let reservation = stores
        .inventory
        .reserve(room.id, stay)
        .await
        .expect("reserve should succeed");
    let now = Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        room_id: room.id,
        holder_id,
        check_in: stay.check_in,
        check_out: stay.check_out,
        status: BookingStatus::Pending,
        amount_due: 1_000_000,
        promo_code: None,
        reservation_id: reservation.id,
        confirmed_order_id: None,
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };
    stores
        .bookings
        .insert_booking(&booking)
        .await
        .expect("insert_booking should succeed");
    booking
}
