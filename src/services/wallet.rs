//! Wallet ledger: append-only credits and debits per profile.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::model::{Amount, NewWalletEntry, WalletSource, WalletTransaction, WalletTxKind};
use crate::storage::{AppendOutcome, StorageError, WalletStore};
use crate::utils::retry::{conflict_backoff, is_retryable_storage};

/// Default and maximum page size for transaction listings.
pub const DEFAULT_PAGE: u32 = 20;
pub const MAX_PAGE: u32 = 100;

/// Reference used for a booking refund, one per verified order.
pub fn refund_reference(order_id: Uuid) -> String {
    format!("refund:{order_id}")
}

/// Reference used for paying a booking from the wallet.
pub fn payment_reference(booking_id: Uuid) -> String {
    format!("payment:{booking_id}")
}

/// Reference used for returning a wallet payment that did not confirm its booking.
pub fn debit_refund_reference(booking_id: Uuid) -> String {
    format!("refund:{}", payment_reference(booking_id))
}

/// A ledger movement request.
#[derive(Debug, Clone)]
pub struct Movement {
    pub profile_id: Uuid,
    pub amount: Amount,
    pub source: WalletSource,
    pub description: String,
    /// Idempotency key. Replaying a movement with the same reference returns
    /// the transaction written the first time.
    pub reference: Option<String>,
}

pub struct WalletLedger {
    store: Arc<dyn WalletStore>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Current balance: `balance_after` of the latest entry, or zero.
    pub async fn balance(&self, profile_id: Uuid) -> Result<Amount> {
        Ok(self
            .store
            .latest(profile_id)
            .await?
            .map(|tx| tx.balance_after)
            .unwrap_or(0))
    }

    pub async fn credit(&self, movement: Movement) -> Result<WalletTransaction> {
        self.append(WalletTxKind::Credit, movement).await
    }

    /// Fails with `InsufficientFunds` without writing anything if the balance
    /// would go negative.
    pub async fn debit(&self, movement: Movement) -> Result<WalletTransaction> {
        self.append(WalletTxKind::Debit, movement).await
    }

    /// Newest first. `limit` defaults to 20 and is capped at 100.
    pub async fn list_transactions(&self, profile_id: Uuid, limit: Option<u32>) -> Result<Vec<WalletTransaction>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
        Ok(self.store.list(profile_id, limit).await?)
    }

    pub async fn find_by_reference(&self, profile_id: Uuid, reference: &str) -> Result<Option<WalletTransaction>> {
        Ok(self.store.find_by_reference(profile_id, reference).await?)
    }

    async fn append(&self, kind: WalletTxKind, movement: Movement) -> Result<WalletTransaction> {
        if movement.amount <= 0 {
            return Err(ServiceError::validation("amount must be positive"));
        }
        let description = movement.description.trim();
        if description.is_empty() || description.chars().count() > 500 {
            return Err(ServiceError::validation(
                "description must be between 1 and 500 characters",
            ));
        }
        if matches!(&movement.reference, Some(r) if r.trim().is_empty()) {
            return Err(ServiceError::validation("reference cannot be blank"));
        }

        let entry = NewWalletEntry {
            profile_id: movement.profile_id,
            kind,
            amount: movement.amount,
            source: movement.source,
            description: description.to_string(),
            reference: movement.reference,
        };

        let outcome = (|| async { self.store.append(&entry).await })
            .retry(conflict_backoff())
            .when(is_retryable_storage)
            .notify(|err: &StorageError, delay: Duration| {
                debug!(profile_id = %entry.profile_id, error = %err, delay = ?delay, "wallet append lost race, retrying");
            })
            .await?;

        match outcome {
            AppendOutcome::Appended(tx) => {
                info!(
                    profile_id = %tx.profile_id,
                    kind = %tx.kind,
                    amount = tx.amount,
                    balance_after = tx.balance_after,
                    source = %tx.source,
                    "wallet transaction recorded"
                );
                Ok(tx)
            }
            AppendOutcome::Duplicate(tx) => {
                debug!(profile_id = %tx.profile_id, reference = ?tx.reference, "wallet reference replayed");
                Ok(tx)
            }
            AppendOutcome::InsufficientFunds { balance } => Err(ServiceError::InsufficientFunds {
                balance,
                requested: entry.amount,
            }),
        }
    }
}
