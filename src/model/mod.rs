//! Domain entities.
//!
//! These are the stable shapes the services work with. Storage backends map
//! their rows into these types at the boundary (see `storage`), so nothing
//! above the storage layer ever sees a raw row.

/// Generates `as_str` / `FromStr` for a fieldless enum stored as text.
///
/// Textually scoped: visible to the entity modules declared below.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {} value: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

mod booking;
mod payment;
mod room;
mod wallet;

pub use booking::{Booking, BookingStatus, PromoCode};
pub use payment::{OrderStatus, PaymentMethod, PaymentOrder};
pub use room::{DateRange, Reservation, Room, RoomStatus};
pub use wallet::{NewWalletEntry, WalletSource, WalletTransaction, WalletTxKind};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Money in minor currency units (paise for INR).
pub type Amount = i64;

/// Caller role as reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub profile_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn student(profile_id: Uuid) -> Self {
        Self {
            profile_id,
            role: Role::Student,
        }
    }

    pub fn admin(profile_id: Uuid) -> Self {
        Self {
            profile_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
