//! BookingStore interface tests.

use chrono::{Duration, Utc};
use uuid::Uuid;

use roomledger::model::{BookingStatus, PromoCode};
use roomledger::storage::{BookingUpdate, Stores};

use super::seed_booking;

pub async fn test_get_missing_booking(stores: &Stores) {
    let booking = stores.bookings.get_booking(Uuid::new_v4()).await.unwrap();
    assert!(booking.is_none());
}

pub async fn test_insert_and_get_booking(stores: &Stores) {
    let holder = Uuid::new_v4();
    let booking = seed_booking(stores, holder).await;

    let loaded = stores
        .bookings
        .get_booking(booking.id)
        .await
        .unwrap()
        .expect("booking should exist");
    assert_eq!(loaded.holder_id, holder);
    assert_eq!(loaded.status, BookingStatus::Pending);
    assert_eq!(loaded.reservation_id, booking.reservation_id);
    assert_eq!(loaded.check_in, booking.check_in);
    assert_eq!(loaded.amount_due, booking.amount_due);
}

pub async fn test_transition_applies_fields(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let order_id = Uuid::new_v4();

    let confirmed = stores
        .bookings
        .transition_booking(
            booking.id,
            &[BookingStatus::Pending],
            BookingUpdate {
                confirmed_order_id: Some(order_id),
                ..BookingUpdate::status(BookingStatus::Confirmed)
            },
        )
        .await
        .unwrap()
        .expect("pending booking should transition");
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert_eq!(confirmed.confirmed_order_id, Some(order_id));

    let loaded = stores.bookings.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, BookingStatus::Confirmed);
    assert_eq!(loaded.confirmed_order_id, Some(order_id));
}

pub async fn test_transition_from_wrong_status_is_noop(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;

    let result = stores
        .bookings
        .transition_booking(
            booking.id,
            &[BookingStatus::Confirmed],
            BookingUpdate::status(BookingStatus::Active),
        )
        .await
        .unwrap();
    assert!(result.is_none(), "CAS should fail from the wrong status");

    let loaded = stores.bookings.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, BookingStatus::Pending);
}

pub async fn test_cancel_records_reason(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let cancelled = stores
        .bookings
        .transition_booking(
            booking.id,
            &[BookingStatus::Pending, BookingStatus::Confirmed],
            BookingUpdate {
                cancellation_reason: Some("moving to another city".to_string()),
                ..BookingUpdate::status(BookingStatus::Cancelled)
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("moving to another city"));
}

pub async fn test_list_for_holder_newest_first(stores: &Stores) {
    let holder = Uuid::new_v4();
    let first = seed_booking(stores, holder).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = seed_booking(stores, holder).await;
    seed_booking(stores, Uuid::new_v4()).await;

    let listed = stores.bookings.list_bookings_for_holder(holder, 10).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let limited = stores.bookings.list_bookings_for_holder(holder, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, second.id);
}

pub async fn test_promo_round_trip(stores: &Stores) {
    let code = format!("TEST{}", Uuid::new_v4().simple());
    let promo = PromoCode {
        code: code.clone(),
        percent_off: Some(10),
        amount_off: None,
        active: true,
        expires_at: Some(Utc::now() + Duration::days(7)),
    };
    stores.bookings.insert_promo(&promo).await.unwrap();

    let loaded = stores.bookings.get_promo(&code).await.unwrap().unwrap();
    assert_eq!(loaded.percent_off, Some(10));
    assert!(loaded.active);
    assert!(loaded.is_valid_at(Utc::now()));

    assert!(stores.bookings.get_promo("NOPE").await.unwrap().is_none());
}

/// Run all BookingStore interface tests against a `Stores`.
#[macro_export]
macro_rules! run_booking_store_tests {
    ($stores:expr) => {
        use $crate::storage::booking_store_tests::*;

        test_get_missing_booking($stores).await;
        println!("  test_get_missing_booking: PASSED");

        test_insert_and_get_booking($stores).await;
        println!("  test_insert_and_get_booking: PASSED");

        test_transition_applies_fields($stores).await;
        println!("  test_transition_applies_fields: PASSED");

        test_transition_from_wrong_status_is_noop($stores).await;
        println!("  test_transition_from_wrong_status_is_noop: PASSED");

        test_cancel_records_reason($stores).await;
        println!("  test_cancel_records_reason: PASSED");

        test_list_for_holder_newest_first($stores).await;
        println!("  test_list_for_holder_newest_first: PASSED");

        test_promo_round_trip($stores).await;
        println!("  test_promo_round_trip: PASSED");
    };
}
