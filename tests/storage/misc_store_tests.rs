//! WebhookStore and OtpStore interface tests.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use uuid::Uuid;

use roomledger::storage::{OtpCheck, OtpLimits, OtpPut, Stores};

pub async fn test_webhook_marked_once(stores: &Stores) {
    let event_id = format!("evt_{}", Uuid::new_v4().simple());
    assert!(!stores.webhooks.is_processed(&event_id).await.unwrap());

    assert!(stores
        .webhooks
        .mark_processed(&event_id, "payment.captured")
        .await
        .unwrap());
    assert!(!stores
        .webhooks
        .mark_processed(&event_id, "payment.captured")
        .await
        .unwrap());
    assert!(stores.webhooks.is_processed(&event_id).await.unwrap());
}

/// Whole seconds, so timestamps compare equal after a round trip through storage.
fn now_secs() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

fn limits(resend_after_secs: i64, max_attempts: u32) -> OtpLimits {
    OtpLimits {
        resend_after: Duration::seconds(resend_after_secs),
        max_attempts,
    }
}

pub async fn test_otp_single_use(stores: &Stores) {
    let subject = format!("{}@example.in", Uuid::new_v4().simple());
    let now = now_secs();
    let put = stores
        .otp
        .put_code(&subject, "hash-a", now, now + Duration::minutes(5), limits(30, 5))
        .await
        .unwrap();
    assert_eq!(put, OtpPut::Stored);

    assert_eq!(
        stores.otp.consume_code(&subject, "hash-a", now, 5).await.unwrap(),
        OtpCheck::Accepted
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash-a", now, 5).await.unwrap(),
        OtpCheck::Missing
    );
}

pub async fn test_otp_put_replaces(stores: &Stores) {
    let subject = format!("{}@example.in", Uuid::new_v4().simple());
    let now = now_secs();
    let expires = now + Duration::minutes(5);
    stores
        .otp
        .put_code(&subject, "hash-old", now, expires, limits(0, 5))
        .await
        .unwrap();
    stores
        .otp
        .put_code(&subject, "hash-new", now, expires, limits(0, 5))
        .await
        .unwrap();

    assert_eq!(
        stores.otp.consume_code(&subject, "hash-old", now, 5).await.unwrap(),
        OtpCheck::Rejected { remaining: 4 }
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash-new", now, 5).await.unwrap(),
        OtpCheck::Accepted
    );
}

pub async fn test_otp_reissue_throttled(stores: &Stores) {
    let subject = format!("{}@example.in", Uuid::new_v4().simple());
    let now = now_secs();
    let expires = now + Duration::minutes(5);
    stores
        .otp
        .put_code(&subject, "hash-old", now, expires, limits(30, 5))
        .await
        .unwrap();
    assert_eq!(
        stores.otp.consume_code(&subject, "wrong", now, 5).await.unwrap(),
        OtpCheck::Rejected { remaining: 4 }
    );

    let soon = now + Duration::seconds(10);
    assert_eq!(
        stores
            .otp
            .put_code(&subject, "hash-new", soon, expires, limits(30, 5))
            .await
            .unwrap(),
        OtpPut::Throttled {
            retry_at: now + Duration::seconds(30)
        }
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash-new", soon, 5).await.unwrap(),
        OtpCheck::Rejected { remaining: 3 }
    );

    // Past the interval the code is replaced and the wrong guesses carry over.
    let later = now + Duration::seconds(40);
    assert_eq!(
        stores
            .otp
            .put_code(&subject, "hash-new", later, later + Duration::minutes(5), limits(30, 5))
            .await
            .unwrap(),
        OtpPut::Stored
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "wrong", later, 5).await.unwrap(),
        OtpCheck::Rejected { remaining: 2 }
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash-new", later, 5).await.unwrap(),
        OtpCheck::Accepted
    );
}

pub async fn test_otp_expiry(stores: &Stores) {
    let subject = format!("{}@example.in", Uuid::new_v4().simple());
    let now = now_secs();
    stores
        .otp
        .put_code(&subject, "hash", now, now, limits(30, 5))
        .await
        .unwrap();

    assert_eq!(
        stores
            .otp
            .consume_code(&subject, "hash", now + Duration::seconds(1), 5)
            .await
            .unwrap(),
        OtpCheck::Expired
    );
}

pub async fn test_otp_attempts_exhausted(stores: &Stores) {
    let subject = format!("{}@example.in", Uuid::new_v4().simple());
    let now = now_secs();
    let expires = now + Duration::minutes(5);
    stores
        .otp
        .put_code(&subject, "hash", now, expires, limits(0, 2))
        .await
        .unwrap();

    assert_eq!(
        stores.otp.consume_code(&subject, "wrong", now, 2).await.unwrap(),
        OtpCheck::Rejected { remaining: 1 }
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "wrong", now, 2).await.unwrap(),
        OtpCheck::Rejected { remaining: 0 }
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash", now, 2).await.unwrap(),
        OtpCheck::Rejected { remaining: 0 }
    );

    // Locked until expiry, then a fresh code starts from zero.
    assert_eq!(
        stores
            .otp
            .put_code(&subject, "hash-2", now, expires, limits(0, 2))
            .await
            .unwrap(),
        OtpPut::Throttled { retry_at: expires }
    );
    let after = expires + Duration::seconds(1);
    assert_eq!(
        stores
            .otp
            .put_code(&subject, "hash-2", after, after + Duration::minutes(5), limits(0, 2))
            .await
            .unwrap(),
        OtpPut::Stored
    );
    assert_eq!(
        stores.otp.consume_code(&subject, "hash-2", after, 2).await.unwrap(),
        OtpCheck::Accepted
    );
}

/// Run all WebhookStore and OtpStore interface tests against a `Stores`.
#[macro_export]
macro_rules! run_misc_store_tests {
    ($stores:expr) => {
        use $crate::storage::misc_store_tests::*;

        test_webhook_marked_once($stores).await;
        println!("  test_webhook_marked_once: PASSED");

        test_otp_single_use($stores).await;
        println!("  test_otp_single_use: PASSED");

        test_otp_put_replaces($stores).await;
        println!("  test_otp_put_replaces: PASSED");

        test_otp_reissue_throttled($stores).await;
        println!("  test_otp_reissue_throttled: PASSED");

        test_otp_expiry($stores).await;
        println!("  test_otp_expiry: PASSED");

        test_otp_attempts_exhausted($stores).await;
        println!("  test_otp_attempts_exhausted: PASSED");
    };
}
