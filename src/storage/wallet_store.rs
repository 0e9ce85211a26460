//! WalletStore trait definition.

use async_trait::async_trait;
use uuid::Uuid;

use super::Result;
use crate::model::{Amount, NewWalletEntry, WalletTransaction};

/// Result of `WalletStore::append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended(WalletTransaction),
    /// An entry with the same reference already exists; nothing was written.
    Duplicate(WalletTransaction),
    /// A debit would take the balance below zero; nothing was written.
    InsufficientFunds { balance: Amount },
}

/// Interface for the append-only wallet ledger.
///
/// The balance is never stored on its own: it is the `balance_after` of the
/// profile's latest entry. Appends are a compare-and-set on the per-profile
/// sequence number, so two concurrent appends cannot both build on the same
/// predecessor.
///
/// Implementations:
/// - `SqliteWalletStore`: SQLite storage
/// - `MockWalletStore`: In-memory mock for testing
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Append an entry computed from the latest balance.
    ///
    /// Returns `Conflict` if another append for the profile committed first.
    async fn append(&self, entry: &NewWalletEntry) -> Result<AppendOutcome>;

    /// Most recent entry for a profile.
    async fn latest(&self, profile_id: Uuid) -> Result<Option<WalletTransaction>>;

    /// Entries newest first.
    async fn list(&self, profile_id: Uuid, limit: u32) -> Result<Vec<WalletTransaction>>;

    async fn find_by_reference(
        &self,
        profile_id: Uuid,
        reference: &str,
    ) -> Result<Option<WalletTransaction>>;
}
