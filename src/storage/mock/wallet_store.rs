//! Mock WalletStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{NewWalletEntry, WalletTransaction};
use crate::storage::{AppendOutcome, Result, StorageError, WalletStore};

/// In-memory ledger, one ordered history per profile.
#[derive(Default)]
pub struct MockWalletStore {
    ledgers: RwLock<HashMap<Uuid, Vec<WalletTransaction>>>,
    pending_conflicts: RwLock<u32>,
}

impl MockWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends lose their compare-and-set.
    pub async fn inject_conflicts(&self, n: u32) {
        *self.pending_conflicts.write().await = n;
    }
}

#[async_trait]
impl WalletStore for MockWalletStore {
    async fn append(&self, entry: &NewWalletEntry) -> Result<AppendOutcome> {
        let mut ledgers = self.ledgers.write().await;

        {
            let mut pending = self.pending_conflicts.write().await;
            if *pending > 0 {
                *pending -= 1;
                return Err(StorageError::Conflict(format!(
                    "wallet {} advanced",
                    entry.profile_id
                )));
            }
        }

        let history = ledgers.entry(entry.profile_id).or_default();

        if let Some(reference) = &entry.reference {
            if let Some(existing) = history
                .iter()
                .find(|tx| tx.reference.as_deref() == Some(reference.as_str()))
            {
                return Ok(AppendOutcome::Duplicate(existing.clone()));
            }
        }

        let (seq, balance) = history
            .last()
            .map(|tx| (tx.seq, tx.balance_after))
            .unwrap_or((0, 0));
        let balance_after = entry
            .kind
            .apply(balance, entry.amount)
            .ok_or_else(|| StorageError::InvalidState(format!("wallet {} balance would overflow", entry.profile_id)))?;
        if balance_after < 0 {
            return Ok(AppendOutcome::InsufficientFunds { balance });
        }

        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            profile_id: entry.profile_id,
            seq: seq + 1,
            kind: entry.kind,
            amount: entry.amount,
            balance_after,
            source: entry.source,
            description: entry.description.clone(),
            reference: entry.reference.clone(),
            created_at: Utc::now(),
        };
        history.push(tx.clone());
        Ok(AppendOutcome::Appended(tx))
    }

    async fn latest(&self, profile_id: Uuid) -> Result<Option<WalletTransaction>> {
        Ok(self
            .ledgers
            .read()
            .await
            .get(&profile_id)
            .and_then(|h| h.last().cloned()))
    }

    async fn list(&self, profile_id: Uuid, limit: u32) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .ledgers
            .read()
            .await
            .get(&profile_id)
            .map(|h| h.iter().rev().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_reference(
        &self,
        profile_id: Uuid,
        reference: &str,
    ) -> Result<Option<WalletTransaction>> {
        Ok(self.ledgers.read().await.get(&profile_id).and_then(|h| {
            h.iter()
                .find(|tx| tx.reference.as_deref() == Some(reference))
                .cloned()
        }))
    }
}
