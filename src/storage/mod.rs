//! Storage abstraction layer.
//!
//! One trait per component, each expressing its atomic operations as a
//! single conditional call so the services never do an unguarded
//! read-then-write:
//!
//! - `InventoryStore`: rooms and reservations (version CAS per room)
//! - `BookingStore`: bookings and promo codes (status CAS per booking)
//! - `PaymentStore`: payment orders (status CAS, one verified order per booking)
//! - `WalletStore`: append-only ledger (sequence CAS per profile)
//! - `WebhookStore`: processed gateway event ids
//! - `OtpStore`: hashed one-time codes with single-use consumption
//!
//! Implementations:
//! - `sqlite`: SQLite via sqlx + sea-query
//! - `mock`: in-memory, for tests and local runs

use std::sync::Arc;

use tracing::info;

mod booking_store;
mod inventory_store;
mod otp_store;
mod payment_store;
mod wallet_store;
mod webhook_store;

pub mod helpers;
pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use booking_store::{BookingStore, BookingUpdate};
pub use inventory_store::InventoryStore;
pub(crate) use otp_store::admit_reissue;
pub use otp_store::{OtpCheck, OtpLimits, OtpPut, OtpStore};
pub use payment_store::{MarkVerified, PaymentStore};
pub use wallet_store::{AppendOutcome, WalletStore};
pub use webhook_store::WebhookStore;

use crate::config::{StorageConfig, StorageType};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested hold cannot be granted (overlap, status, or capacity).
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// A compare-and-set lost a race. Safe to re-evaluate and retry.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The store is unreachable or held by another writer past the busy timeout.
    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Only lost compare-and-set races are worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Busy(err.to_string())
            }
            sqlx::Error::Database(db) if is_busy_code(db.code().as_deref()) => StorageError::Busy(err.to_string()),
            _ => StorageError::Database(err.to_string()),
        }
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6), including their extended codes.
#[cfg(feature = "sqlite")]
fn is_busy_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

impl From<uuid::Error> for StorageError {
    fn from(err: uuid::Error) -> Self {
        StorageError::Corrupt(format!("invalid uuid: {err}"))
    }
}

impl From<chrono::ParseError> for StorageError {
    fn from(err: chrono::ParseError) -> Self {
        StorageError::Corrupt(format!("invalid timestamp: {err}"))
    }
}

/// Handles to every store, shared by the services.
#[derive(Clone)]
pub struct Stores {
    pub inventory: Arc<dyn InventoryStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub wallet: Arc<dyn WalletStore>,
    pub webhooks: Arc<dyn WebhookStore>,
    pub otp: Arc<dyn OtpStore>,
}

impl Stores {
    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            inventory: Arc::new(mock::MockInventoryStore::new()),
            bookings: Arc::new(mock::MockBookingStore::new()),
            payments: Arc::new(mock::MockPaymentStore::new()),
            wallet: Arc::new(mock::MockWalletStore::new()),
            webhooks: Arc::new(mock::MockWebhookStore::new()),
            otp: Arc::new(mock::MockOtpStore::new()),
        }
    }

    /// SQLite-backed stores sharing one pool. The schema must already exist.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(pool: sqlx::SqlitePool) -> Self {
        Self {
            inventory: Arc::new(sqlite::SqliteInventoryStore::new(pool.clone())),
            bookings: Arc::new(sqlite::SqliteBookingStore::new(pool.clone())),
            payments: Arc::new(sqlite::SqlitePaymentStore::new(pool.clone())),
            wallet: Arc::new(sqlite::SqliteWalletStore::new(pool.clone())),
            webhooks: Arc::new(sqlite::SqliteWebhookStore::new(pool.clone())),
            otp: Arc::new(sqlite::SqliteOtpStore::new(pool)),
        }
    }
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> std::result::Result<Stores, Box<dyn std::error::Error>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok(Stores::in_memory())
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            info!("Storage: sqlite at {}", config.sqlite.path);
            let pool = sqlite::connect(&config.sqlite).await?;
            sqlite::init_schema(&pool).await?;
            Ok(Stores::sqlite(pool))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            tracing::error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err("SQLite feature not enabled".into())
        }
    }
}
