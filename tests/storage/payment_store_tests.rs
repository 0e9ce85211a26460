//! PaymentStore interface tests.

use uuid::Uuid;

use roomledger::model::{OrderStatus, PaymentMethod, PaymentOrder};
use roomledger::storage::{MarkVerified, Stores};

use super::seed_booking;

async fn seed_order(stores: &Stores, booking_id: Uuid) -> PaymentOrder {
    let order = PaymentOrder::new(booking_id, 1_000_000, "INR", PaymentMethod::Gateway);
    stores.payments.insert_order(&order).await.unwrap();
    order
}

pub async fn test_insert_and_get_order(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let order = seed_order(stores, booking.id).await;

    let loaded = stores.payments.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.booking_id, booking.id);
    assert_eq!(loaded.status, OrderStatus::Created);
    assert_eq!(loaded.method, PaymentMethod::Gateway);
    assert!(loaded.gateway_order_id.is_none());

    assert!(stores.payments.get_order(Uuid::new_v4()).await.unwrap().is_none());
}

pub async fn test_attach_gateway_order_once(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let order = seed_order(stores, booking.id).await;
    let gw_first = format!("order_{}", Uuid::new_v4().simple());
    let gw_second = format!("order_{}", Uuid::new_v4().simple());

    assert!(stores.payments.attach_gateway_order(order.id, &gw_first).await.unwrap());
    assert!(!stores.payments.attach_gateway_order(order.id, &gw_second).await.unwrap());

    let found = stores
        .payments
        .find_order_by_gateway_id(&gw_first)
        .await
        .unwrap()
        .expect("lookup by gateway id");
    assert_eq!(found.id, order.id);
    assert!(stores
        .payments
        .find_order_by_gateway_id(&gw_second)
        .await
        .unwrap()
        .is_none());
}

pub async fn test_mark_verified_outcomes(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let first = seed_order(stores, booking.id).await;
    let second = seed_order(stores, booking.id).await;

    match stores.payments.mark_verified(first.id, "pay_1").await.unwrap() {
        MarkVerified::Verified(order) => {
            assert_eq!(order.status, OrderStatus::Verified);
            assert_eq!(order.gateway_payment_id.as_deref(), Some("pay_1"));
        }
        other => panic!("expected Verified, got {other:?}"),
    }

    assert!(matches!(
        stores.payments.mark_verified(first.id, "pay_1").await.unwrap(),
        MarkVerified::AlreadyVerified(_)
    ));

    match stores.payments.mark_verified(second.id, "pay_2").await.unwrap() {
        MarkVerified::BookingAlreadyPaid(other) => assert_eq!(other.id, first.id),
        other => panic!("expected BookingAlreadyPaid, got {other:?}"),
    }

    let verified = stores
        .payments
        .verified_order_for_booking(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verified.id, first.id);
}

pub async fn test_mark_failed_only_from_created(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let order = seed_order(stores, booking.id).await;

    assert!(stores.payments.mark_failed(order.id).await.unwrap());
    assert!(!stores.payments.mark_failed(order.id).await.unwrap());
    assert!(matches!(
        stores.payments.mark_verified(order.id, "pay_late").await.unwrap(),
        MarkVerified::NotOpen(_)
    ));
    assert!(stores
        .payments
        .verified_order_for_booking(booking.id)
        .await
        .unwrap()
        .is_none());
}

pub async fn test_list_orders_oldest_first(stores: &Stores) {
    let booking = seed_booking(stores, Uuid::new_v4()).await;
    let first = seed_order(stores, booking.id).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = seed_order(stores, booking.id).await;

    let ids: Vec<Uuid> = stores
        .payments
        .list_orders_for_booking(booking.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

/// Run all PaymentStore interface tests against a `Stores`.
#[macro_export]
macro_rules! run_payment_store_tests {
    ($stores:expr) => {
        use $crate::storage::payment_store_tests::*;

        test_insert_and_get_order($stores).await;
        println!("  test_insert_and_get_order: PASSED");

        test_attach_gateway_order_once($stores).await;
        println!("  test_attach_gateway_order_once: PASSED");

        test_mark_verified_outcomes($stores).await;
        println!("  test_mark_verified_outcomes: PASSED");

        test_mark_failed_only_from_created($stores).await;
        println!("  test_mark_failed_only_from_created: PASSED");

        test_list_orders_oldest_first($stores).await;
        println!("  test_list_orders_oldest_first: PASSED");
    };
}
