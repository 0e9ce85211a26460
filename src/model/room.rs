use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

/// Operational state of a room.
///
/// `Reserved` and `Occupied` are derived from live reservations and check-ins;
/// only `Maintenance` blocks new reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Available,
    Reserved,
    Occupied,
    Maintenance,
}

text_enum!(RoomStatus {
    Available => "available",
    Reserved => "reserved",
    Occupied => "occupied",
    Maintenance => "maintenance",
});

impl RoomStatus {
    pub fn accepts_reservations(&self) -> bool {
        !matches!(self, RoomStatus::Maintenance)
    }

    /// Status implied by occupancy and live holds. Maintenance is sticky
    /// until cleared explicitly.
    pub fn derive(current: RoomStatus, occupancy: u32, live_reservations: usize) -> RoomStatus {
        if current == RoomStatus::Maintenance {
            RoomStatus::Maintenance
        } else if occupancy > 0 {
            RoomStatus::Occupied
        } else if live_reservations > 0 {
            RoomStatus::Reserved
        } else {
            RoomStatus::Available
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub property_id: Uuid,
    pub capacity: u32,
    pub current_occupancy: u32,
    /// Base price per started month, in minor units.
    pub monthly_rent: Amount,
    pub status: RoomStatus,
    /// Bumped by every inventory mutation; the CAS token for reservations.
    pub version: i64,
}

impl Room {
    /// A freshly onboarded room with no occupants.
    pub fn new(property_id: Uuid, capacity: u32, monthly_rent: Amount) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            capacity,
            current_occupancy: 0,
            monthly_rent,
            status: RoomStatus::Available,
            version: 0,
        }
    }
}

/// Half-open stay interval `[check_in, check_out)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl DateRange {
    /// Returns `None` unless `check_out > check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_out > check_in).then_some(Self {
            check_in,
            check_out,
        })
    }

    /// Two stays overlap when each starts before the other ends. A check-out
    /// on the same day as the next check-in is not an overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Number of started calendar months covered by the stay.
    pub fn billable_months(&self) -> u32 {
        let mut months = 0u32;
        loop {
            let start = self
                .check_in
                .checked_add_months(chrono::Months::new(months));
            match start {
                Some(start) if start < self.check_out => months += 1,
                _ => return months,
            }
        }
    }
}

/// An exclusive hold on a room for a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub room_id: Uuid,
    pub range: DateRange,
    pub released: bool,
    pub created_at: DateTime<Utc>,
}
