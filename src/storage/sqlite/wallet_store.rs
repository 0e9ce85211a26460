//! SQLite WalletStore implementation.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{begin_immediate, conflict_on_unique, finish};
use crate::model::{NewWalletEntry, WalletTransaction};
use crate::storage::helpers::{format_timestamp, parse_enum, parse_timestamp, parse_uuid};
use crate::storage::schema::WalletTransactions;
use crate::storage::{AppendOutcome, Result, StorageError, WalletStore};

const TX_COLUMNS: [WalletTransactions; 10] = [
    WalletTransactions::Id,
    WalletTransactions::ProfileId,
    WalletTransactions::Seq,
    WalletTransactions::Kind,
    WalletTransactions::Amount,
    WalletTransactions::BalanceAfter,
    WalletTransactions::Source,
    WalletTransactions::Description,
    WalletTransactions::Reference,
    WalletTransactions::CreatedAt,
];

fn tx_from_row(row: &SqliteRow) -> Result<WalletTransaction> {
    Ok(WalletTransaction {
        id: parse_uuid(&row.try_get::<String, _>("id")?)?,
        profile_id: parse_uuid(&row.try_get::<String, _>("profile_id")?)?,
        seq: row.try_get("seq")?,
        kind: parse_enum(&row.try_get::<String, _>("kind")?)?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        source: parse_enum(&row.try_get::<String, _>("source")?)?,
        description: row.try_get("description")?,
        reference: row.try_get("reference")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    })
}

/// SQLite implementation of WalletStore.
pub struct SqliteWalletStore {
    pool: SqlitePool,
}

impl SqliteWalletStore {
    /// Create a new SQLite wallet store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_latest(conn: &mut SqliteConnection, profile_id: Uuid) -> Result<Option<WalletTransaction>> {
        let query = Query::select()
            .columns(TX_COLUMNS)
            .from(WalletTransactions::Table)
            .and_where(Expr::col(WalletTransactions::ProfileId).eq(profile_id.to_string()))
            .order_by(WalletTransactions::Seq, Order::Desc)
            .limit(1)
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(tx_from_row).transpose()
    }

    async fn fetch_by_reference(
        conn: &mut SqliteConnection,
        profile_id: Uuid,
        reference: &str,
    ) -> Result<Option<WalletTransaction>> {
        let query = Query::select()
            .columns(TX_COLUMNS)
            .from(WalletTransactions::Table)
            .and_where(Expr::col(WalletTransactions::ProfileId).eq(profile_id.to_string()))
            .and_where(Expr::col(WalletTransactions::Reference).eq(reference))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&mut *conn).await?;
        row.as_ref().map(tx_from_row).transpose()
    }

    async fn append_in_tx(conn: &mut SqliteConnection, entry: &NewWalletEntry) -> Result<AppendOutcome> {
        if let Some(reference) = &entry.reference {
            if let Some(existing) = Self::fetch_by_reference(conn, entry.profile_id, reference).await? {
                return Ok(AppendOutcome::Duplicate(existing));
            }
        }

        let (seq, balance) = Self::fetch_latest(conn, entry.profile_id)
            .await?
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

        // UNIQUE(profile_id, seq) is the compare-and-set on the predecessor.
        let query = Query::insert()
            .into_table(WalletTransactions::Table)
            .columns(TX_COLUMNS)
            .values_panic([
                tx.id.to_string().into(),
                tx.profile_id.to_string().into(),
                tx.seq.into(),
                tx.kind.as_str().into(),
                tx.amount.into(),
                tx.balance_after.into(),
                tx.source.as_str().into(),
                tx.description.clone().into(),
                tx.reference.clone().into(),
                format_timestamp(tx.created_at).into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query)
            .execute(&mut *conn)
            .await
            .map_err(|e| conflict_on_unique(e, || format!("wallet {} advanced", entry.profile_id)))?;

        Ok(AppendOutcome::Appended(tx))
    }
}

#[async_trait]
impl WalletStore for SqliteWalletStore {
    async fn append(&self, entry: &NewWalletEntry) -> Result<AppendOutcome> {
        let mut tx = begin_immediate(&self.pool).await?;
        let result = Self::append_in_tx(&mut tx, entry).await;
        finish(tx, result).await
    }

    async fn latest(&self, profile_id: Uuid) -> Result<Option<WalletTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_latest(&mut conn, profile_id).await
    }

    async fn list(&self, profile_id: Uuid, limit: u32) -> Result<Vec<WalletTransaction>> {
        let query = Query::select()
            .columns(TX_COLUMNS)
            .from(WalletTransactions::Table)
            .and_where(Expr::col(WalletTransactions::ProfileId).eq(profile_id.to_string()))
            .order_by(WalletTransactions::Seq, Order::Desc)
            .limit(u64::from(limit))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(tx_from_row).collect()
    }

    async fn find_by_reference(
        &self,
        profile_id: Uuid,
        reference: &str,
    ) -> Result<Option<WalletTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_reference(&mut conn, profile_id, reference).await
    }
}
