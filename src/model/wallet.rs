use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletTxKind {
    Credit,
    Debit,
}

text_enum!(WalletTxKind {
    Credit => "credit",
    Debit => "debit",
});

impl WalletTxKind {
    /// Signed effect of `amount` on the balance.
    pub fn signed(&self, amount: Amount) -> Amount {
        match self {
            WalletTxKind::Credit => amount,
            WalletTxKind::Debit => -amount,
        }
    }

    /// Balance after applying `amount`, or `None` if it does not fit.
    pub fn apply(&self, balance: Amount, amount: Amount) -> Option<Amount> {
        balance.checked_add(self.signed(amount))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletSource {
    TopUp,
    BookingPayment,
    BookingRefund,
    Adjustment,
}

text_enum!(WalletSource {
    TopUp => "top_up",
    BookingPayment => "booking_payment",
    BookingRefund => "booking_refund",
    Adjustment => "adjustment",
});

/// Append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub profile_id: Uuid,
    /// 1-based position in the profile's history.
    pub seq: i64,
    pub kind: WalletTxKind,
    pub amount: Amount,
    pub balance_after: Amount,
    pub source: WalletSource,
    pub description: String,
    /// Idempotency key; unique per profile when set.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input to a ledger append. The store assigns `seq` and `balance_after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWalletEntry {
    pub profile_id: Uuid,
    pub kind: WalletTxKind,
    pub amount: Amount,
    pub source: WalletSource,
    pub description: String,
    pub reference: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_checks_overflow() {
        assert_eq!(WalletTxKind::Credit.apply(100, 50), Some(150));
        assert_eq!(WalletTxKind::Debit.apply(100, 150), Some(-50));
        assert_eq!(WalletTxKind::Credit.apply(Amount::MAX, 1), None);
    }
}
