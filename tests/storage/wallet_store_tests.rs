//! WalletStore interface tests.

use std::sync::Arc;

use uuid::Uuid;

use roomledger::model::{NewWalletEntry, WalletSource, WalletTxKind};
use roomledger::storage::{AppendOutcome, StorageError, Stores};

fn entry(profile_id: Uuid, kind: WalletTxKind, amount: i64, reference: Option<&str>) -> NewWalletEntry {
    NewWalletEntry {
        profile_id,
        kind,
        amount,
        source: WalletSource::TopUp,
        description: "test movement".to_string(),
        reference: reference.map(str::to_string),
    }
}

pub async fn test_empty_wallet(stores: &Stores) {
    let profile = Uuid::new_v4();
    assert!(stores.wallet.latest(profile).await.unwrap().is_none());
    assert!(stores.wallet.list(profile, 10).await.unwrap().is_empty());
}

pub async fn test_append_tracks_sequence_and_balance(stores: &Stores) {
    let profile = Uuid::new_v4();

    let credit = match stores
        .wallet
        .append(&entry(profile, WalletTxKind::Credit, 1_000, None))
        .await
        .unwrap()
    {
        AppendOutcome::Appended(tx) => tx,
        other => panic!("expected Appended, got {other:?}"),
    };
    assert_eq!(credit.seq, 1);
    assert_eq!(credit.balance_after, 1_000);

    let debit = match stores
        .wallet
        .append(&entry(profile, WalletTxKind::Debit, 400, None))
        .await
        .unwrap()
    {
        AppendOutcome::Appended(tx) => tx,
        other => panic!("expected Appended, got {other:?}"),
    };
    assert_eq!(debit.seq, 2);
    assert_eq!(debit.balance_after, 600);

    let latest = stores.wallet.latest(profile).await.unwrap().unwrap();
    assert_eq!(latest.id, debit.id);

    let listed = stores.wallet.list(profile, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, debit.id, "newest first");
}

pub async fn test_overdraft_writes_nothing(stores: &Stores) {
    let profile = Uuid::new_v4();
    stores
        .wallet
        .append(&entry(profile, WalletTxKind::Credit, 100, None))
        .await
        .unwrap();

    let outcome = stores
        .wallet
        .append(&entry(profile, WalletTxKind::Debit, 101, None))
        .await
        .unwrap();
    assert_eq!(outcome, AppendOutcome::InsufficientFunds { balance: 100 });
    assert_eq!(stores.wallet.list(profile, 10).await.unwrap().len(), 1);
}

pub async fn test_reference_is_idempotent(stores: &Stores) {
    let profile = Uuid::new_v4();
    let first = stores
        .wallet
        .append(&entry(profile, WalletTxKind::Credit, 500, Some("refund:abc")))
        .await
        .unwrap();
    let AppendOutcome::Appended(tx) = first else {
        panic!("expected Appended, got {first:?}");
    };

    let replay = stores
        .wallet
        .append(&entry(profile, WalletTxKind::Credit, 500, Some("refund:abc")))
        .await
        .unwrap();
    match replay {
        AppendOutcome::Duplicate(existing) => assert_eq!(existing.id, tx.id),
        other => panic!("expected Duplicate, got {other:?}"),
    }
    assert_eq!(stores.wallet.latest(profile).await.unwrap().unwrap().balance_after, 500);

    let found = stores
        .wallet
        .find_by_reference(profile, "refund:abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, tx.id);

    // References are scoped per profile.
    let other = Uuid::new_v4();
    assert!(matches!(
        stores
            .wallet
            .append(&entry(other, WalletTxKind::Credit, 500, Some("refund:abc")))
            .await
            .unwrap(),
        AppendOutcome::Appended(_)
    ));
}

/// Concurrent debits never drive the balance negative.
pub async fn test_concurrent_debits_never_overdraw(stores: &Stores) {
    let profile = Uuid::new_v4();
    stores
        .wallet
        .append(&entry(profile, WalletTxKind::Credit, 1_000, None))
        .await
        .unwrap();

    let wallet = Arc::clone(&stores.wallet);
    let debits = (0..6).map(|_| {
        let wallet = Arc::clone(&wallet);
        tokio::spawn(async move {
            wallet
                .append(&entry(profile, WalletTxKind::Debit, 300, None))
                .await
        })
    });
    let results = futures::future::join_all(debits).await;

    let mut applied = 0;
    for result in results {
        match result.unwrap() {
            Ok(AppendOutcome::Appended(_)) => applied += 1,
            Ok(AppendOutcome::InsufficientFunds { .. }) | Err(StorageError::Conflict(_)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert!(applied <= 3, "at most three 300 debits fit in 1000");

    let latest = stores.wallet.latest(profile).await.unwrap().unwrap();
    assert_eq!(latest.balance_after, 1_000 - 300 * applied);
    assert!(latest.balance_after >= 0);
}

/// Run all WalletStore interface tests against a `Stores`.
#[macro_export]
macro_rules! run_wallet_store_tests {
    ($stores:expr) => {
        use $crate::storage::wallet_store_tests::*;

        test_empty_wallet($stores).await;
        println!("  test_empty_wallet: PASSED");

        test_append_tracks_sequence_and_balance($stores).await;
        println!("  test_append_tracks_sequence_and_balance: PASSED");

        test_overdraft_writes_nothing($stores).await;
        println!("  test_overdraft_writes_nothing: PASSED");

        test_reference_is_idempotent($stores).await;
        println!("  test_reference_is_idempotent: PASSED");

        test_concurrent_debits_never_overdraw($stores).await;
        println!("  test_concurrent_debits_never_overdraw: PASSED");
    };
}
