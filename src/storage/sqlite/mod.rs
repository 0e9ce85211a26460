//! SQLite implementations of storage interfaces.
//!
//! Every multi-statement mutation runs inside `BEGIN IMMEDIATE`, which takes
//! the write lock up front. Reads inside such a transaction therefore see the
//! state the subsequent writes are applied to, and two writers never race to
//! upgrade a shared lock.

use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::config::SqliteConfig;
use crate::storage::schema::SCHEMA;
use crate::storage::{Result, StorageError};

mod booking_store;
mod inventory_store;
mod otp_store;
mod payment_store;
mod wallet_store;
mod webhook_store;

pub use booking_store::SqliteBookingStore;
pub use inventory_store::SqliteInventoryStore;
pub use otp_store::SqliteOtpStore;
pub use payment_store::SqlitePaymentStore;
pub use wallet_store::SqliteWalletStore;
pub use webhook_store::SqliteWebhookStore;

/// Open a pool for the configured database file.
///
/// `:memory:` databases are private to a connection, so they get a pool of one.
pub async fn connect(config: &SqliteConfig) -> Result<SqlitePool> {
    let in_memory = config.path == ":memory:";
    let mut opts = SqliteConnectOptions::new()
        .filename(&config.path)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .foreign_keys(true)
        .create_if_missing(true);
    if !in_memory {
        opts = opts.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { config.max_connections };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(opts)
        .await?;

    debug!(path = %config.path, max_connections, "sqlite pool ready");
    Ok(pool)
}

/// Create all tables and indexes if they do not exist.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Acquire a connection and open a write transaction on it.
///
/// The returned transaction rolls back when dropped, so a cancelled request
/// never hands a connection back to the pool with the write lock held.
pub(crate) async fn begin_immediate(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Commit on success, roll back on error.
pub(crate) async fn finish<T>(tx: Transaction<'static, Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                debug!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// True when `err` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StorageError {
    if is_unique_violation(&err) {
        StorageError::Conflict(what())
    } else {
        StorageError::from(err)
    }
}
