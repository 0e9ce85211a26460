use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Amount, DateRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

text_enum!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Active => "active",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl BookingStatus {
    /// Statuses from which a holder may still cancel.
    pub const CANCELLABLE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Allowed forward transitions of the lifecycle.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Active)
                | (Active, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub holder_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub amount_due: Amount,
    pub promo_code: Option<String>,
    pub reservation_id: Uuid,
    pub confirmed_order_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange {
            check_in: self.check_in,
            check_out: self.check_out,
        }
    }

    pub fn is_owned_by(&self, profile_id: Uuid) -> bool {
        self.holder_id == profile_id
    }
}

/// Discount code applied at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    /// Percentage off, 1..=100. Takes precedence over `amount_off`.
    pub percent_off: Option<u8>,
    pub amount_off: Option<Amount>,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PromoCode {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.map_or(true, |exp| now < exp)
    }

    /// Price after discount, never below zero.
    pub fn apply(&self, base: Amount) -> Amount {
        let discount = match (self.percent_off, self.amount_off) {
            (Some(pct), _) => base * i64::from(pct.min(100)) / 100,
            (None, Some(flat)) => flat.max(0),
            (None, None) => 0,
        };
        (base - discount).max(0)
    }
}
